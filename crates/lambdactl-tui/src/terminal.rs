// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::io::{self, Stdout};

use anyhow::{Context, Result};
use crossterm::terminal::{self, disable_raw_mode, enable_raw_mode};
use crossterm::{cursor, execute};
use lambdactl_app::ConsoleState;
use ratatui::Terminal;
use ratatui::backend::CrosstermBackend;

use crate::render::render;

/// The screen the console draws on, which it can hand to a child process and
/// take back.
pub trait TerminalOwnership {
    fn size(&self) -> Result<(u16, u16)>;
    fn draw(&mut self, state: &ConsoleState) -> Result<()>;
    /// Give the terminal back in cooked mode on the main screen.
    fn suspend(&mut self) -> Result<()>;
    /// Reclaim the terminal and force a full redraw.
    fn resume(&mut self) -> Result<()>;
}

pub struct CrosstermTerminal {
    terminal: Terminal<CrosstermBackend<Stdout>>,
}

impl CrosstermTerminal {
    pub fn enter() -> Result<Self> {
        enable_raw_mode().context("enable raw mode")?;
        let mut stdout = io::stdout();
        execute!(stdout, terminal::EnterAlternateScreen).context("enter alternate screen")?;

        let backend = CrosstermBackend::new(stdout);
        let terminal = Terminal::new(backend).context("create terminal")?;
        Ok(Self { terminal })
    }

    pub fn leave(mut self) -> Result<()> {
        disable_raw_mode().context("disable raw mode")?;
        execute!(
            self.terminal.backend_mut(),
            terminal::LeaveAlternateScreen,
            cursor::Show
        )
        .context("leave alternate screen")?;
        Ok(())
    }
}

impl TerminalOwnership for CrosstermTerminal {
    fn size(&self) -> Result<(u16, u16)> {
        terminal::size().context("read terminal size")
    }

    fn draw(&mut self, state: &ConsoleState) -> Result<()> {
        self.terminal
            .draw(|frame| render(frame, state))
            .context("draw frame")?;
        Ok(())
    }

    fn suspend(&mut self) -> Result<()> {
        disable_raw_mode().context("disable raw mode")?;
        execute!(
            self.terminal.backend_mut(),
            terminal::LeaveAlternateScreen,
            cursor::Show
        )
        .context("leave alternate screen")?;
        Ok(())
    }

    fn resume(&mut self) -> Result<()> {
        enable_raw_mode().context("enable raw mode")?;
        execute!(self.terminal.backend_mut(), terminal::EnterAlternateScreen)
            .context("enter alternate screen")?;
        self.terminal.clear().context("clear terminal")?;
        Ok(())
    }
}
