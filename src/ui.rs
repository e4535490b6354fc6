use crate::client::AppSnapshot;
use color_eyre::eyre::{
    Result,
    eyre,
};
use crossterm::{
    event::{
        self,
        Event,
        KeyCode,
        KeyEventKind,
        KeyModifiers,
    },
    terminal::{
        disable_raw_mode,
        enable_raw_mode,
    },
};
use ratatui::{
    prelude::*,
    widgets::*,
};
use red_vs_blue::{
    metrics::Side,
    session::Action,
};
use std::io::stdout;
use tokio::sync::mpsc;

const SHOWN_ERRORS: usize = 5;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum UserEvent {
    Quit,
    Previous,
    Next,
    Latest,
    AmountInput(char),
    AmountErase,
    Act(Action),
    Redraw,
}

#[derive(Default)]
pub struct UiState {
    terminal: Option<Terminal<CrosstermBackend<std::io::Stdout>>>,
    is_active: bool,
    claimable: bool,
}

pub type InputEventReceiver = mpsc::UnboundedReceiver<std::io::Result<Event>>;

/// Reads terminal input on a dedicated thread, since crossterm reads block.
pub fn input_event_stream() -> InputEventReceiver {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        loop {
            let event = event::read();
            let failed = event.is_err();
            if tx.send(event).is_err() || failed {
                break;
            }
        }
    });
    rx
}

pub async fn next_raw_event(input_events: &mut InputEventReceiver) -> Result<Event> {
    match input_events.recv().await {
        Some(event) => Ok(event?),
        None => Err(eyre!("terminal input closed")),
    }
}

pub fn interpret_event(state: &mut UiState, event: Event) -> Option<UserEvent> {
    let key = match event {
        Event::Key(key) if key.kind == KeyEventKind::Press => key,
        Event::Resize(..) => return Some(UserEvent::Redraw),
        _ => return None,
    };
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return Some(UserEvent::Quit);
    }
    let event = match key.code {
        KeyCode::Char('q') | KeyCode::Esc => UserEvent::Quit,
        KeyCode::Left | KeyCode::Char('h') => UserEvent::Previous,
        KeyCode::Right | KeyCode::Char('l') => UserEvent::Next,
        KeyCode::Char('g') => UserEvent::Latest,
        KeyCode::Char('r') if state.is_active => UserEvent::Act(Action::Vote(Side::Red)),
        KeyCode::Char('b') if state.is_active => UserEvent::Act(Action::Vote(Side::Blue)),
        KeyCode::Char('c') if !state.is_active && state.claimable => {
            UserEvent::Act(Action::Claim)
        }
        KeyCode::Char('d') => UserEvent::Act(Action::Deposit),
        KeyCode::Char('w') => UserEvent::Act(Action::Withdraw),
        KeyCode::Char(c) if c.is_ascii_digit() || c == '.' => UserEvent::AmountInput(c),
        KeyCode::Backspace => UserEvent::AmountErase,
        _ => return None,
    };
    Some(event)
}

pub fn terminal_enter(state: &mut UiState) -> Result<()> {
    enable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout());
    let terminal = Terminal::new(backend)?;
    state.terminal = Some(terminal);
    Ok(())
}

pub fn terminal_exit() -> Result<()> {
    disable_raw_mode()?;
    crossterm::execute!(std::io::stdout(), crossterm::terminal::LeaveAlternateScreen)?;
    Ok(())
}

pub fn draw(state: &mut UiState, snap: &AppSnapshot) -> Result<()> {
    state.is_active = snap.view.is_some_and(|v| v.is_active());
    state.claimable = snap.metrics.claimable();
    if let Some(mut term) = state.terminal.take() {
        term.draw(|f| ui(f, snap))?;
        state.terminal = Some(term);
    }
    Ok(())
}

fn ui(f: &mut Frame, snap: &AppSnapshot) {
    f.render_widget(Clear, f.area());
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(4), // percentages + totals
            Constraint::Length(3), // split bar
            Constraint::Length(9), // round
            Constraint::Length(6), // account
            Constraint::Min(4),    // status/errors
            Constraint::Length(3), // help
        ])
        .split(f.area());

    draw_header(f, chunks[0], snap);
    draw_split(f, chunks[1], snap);
    draw_round(f, chunks[2], snap);
    draw_account(f, chunks[3], snap);
    draw_status(f, chunks[4], snap);
    draw_help(f, chunks[5], snap);
}

fn side_color(side: Side) -> Color {
    match side {
        Side::Red => Color::Red,
        Side::Blue => Color::Blue,
    }
}

fn draw_header(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let halves = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(area);
    let totals = snap.metrics.totals().copied().unwrap_or_default();
    for (side, rect) in [(Side::Red, halves[0]), (Side::Blue, halves[1])] {
        let lines = vec![
            Line::from(format!("{side}: {}%", snap.metrics.percent_label(side))),
            Line::from(format_credits(totals.of(side))),
        ];
        let widget = Paragraph::new(lines)
            .alignment(Alignment::Center)
            .style(Style::default().fg(side_color(side)).add_modifier(Modifier::BOLD))
            .block(Block::default().borders(Borders::ALL));
        f.render_widget(widget, rect);
    }
}

fn draw_split(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let is_active = snap.view.is_some_and(|v| v.is_active());
    let red_share = snap.metrics.side_percent(Side::Red).round().clamp(0.0, 100.0) as u16;
    let parts = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage(red_share),
            Constraint::Percentage(100 - red_share),
        ])
        .split(area);
    for (side, rect) in [(Side::Red, parts[0]), (Side::Blue, parts[1])] {
        let label = snap.metrics.outcome(side, is_active).label();
        let widget = Paragraph::new(label)
            .alignment(Alignment::Center)
            .style(Style::default().fg(Color::White).bg(side_color(side)))
            .block(Block::default().borders(Borders::NONE));
        f.render_widget(widget, rect);
    }
}

fn draw_round(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let mut lines = vec![
        Line::from("A game of tug-of-war for degens."),
        Line::from(round_line(snap)),
        Line::from("* No token b/s, 1 ETH == 1000 credits"),
    ];
    if let Some(left) = snap.blocks_left {
        let div = snap.view.map(|v| v.blocks_elapsed() + left).unwrap_or(left);
        lines.push(Line::from(format!(
            "* New round every {div} blocks [{left} blocks left]"
        )));
    }
    lines.push(Line::from("* Losing color pays winning color"));
    if let Some(line) = result_line(snap) {
        lines.push(line);
    }
    let widget = Paragraph::new(lines)
        .wrap(Wrap { trim: false })
        .block(Block::default().borders(Borders::ALL).title(format!(
            "Red vs Blue @ {:#x}",
            snap.contract
        )));
    f.render_widget(widget, area);
}

/// `Round: < 4 [ongoing]` or `Round: < 3 > latest`, with each affordance
/// shown only where navigation is possible.
pub fn round_line(snap: &AppSnapshot) -> String {
    let Some(view) = snap.view else {
        return String::from("Round: ...");
    };
    let mut line = String::from("Round: ");
    if snap.can_go_previous {
        line.push_str("< ");
    }
    line.push_str(&view.viewed_round().to_string());
    if view.is_active() {
        line.push_str(" [ongoing]");
    }
    if snap.can_go_next {
        line.push_str(" > latest");
    }
    line
}

fn result_line(snap: &AppSnapshot) -> Option<Line<'static>> {
    let view = snap.view?;
    if view.is_active() {
        let totals = snap.metrics.totals().copied().unwrap_or_default();
        return Some(Line::from(vec![
            Span::raw("* Ongoing round,"),
            Span::styled(
                format!(" {} ", format_credits(totals.red)),
                Style::default().fg(Color::Red),
            ),
            Span::raw("vs"),
            Span::styled(
                format!(" {} ", format_credits(totals.blue)),
                Style::default().fg(Color::Blue),
            ),
        ]));
    }
    let earnings = snap.metrics.earnings().copied()?;
    let profit = earnings.profit();
    let mut spans = vec![Span::raw(format!(
        "* Result: {}",
        format_credits(earnings.reward)
    ))];
    if profit >= 0.0 {
        spans.push(Span::styled(
            format!(" (+{})", format_credits(profit)),
            Style::default().fg(Color::Green),
        ));
    } else {
        spans.push(Span::styled(
            format!(" ({})", format_credits(profit)),
            Style::default().fg(Color::Red),
        ));
    }
    if earnings.reward > 0.0 {
        if earnings.claimable() {
            spans.push(Span::styled(
                " claim (c)",
                Style::default().add_modifier(Modifier::BOLD),
            ));
        } else {
            spans.push(Span::raw(" [claimed]"));
        }
    }
    Some(Line::from(spans))
}

fn draw_account(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let is_active = snap.view.is_some_and(|v| v.is_active());
    let amount = if is_active {
        format!("Vote Red (r) [ {} ] Vote Blue (b)", snap.tx_amount)
    } else {
        format!("Amount: [ {} ]", snap.tx_amount)
    };
    let mut lines = vec![
        Line::from(format!(
            "You have {} credits!",
            format_credits(snap.credit_balance)
        ))
        .style(Style::default().add_modifier(Modifier::BOLD)),
        Line::from(amount),
        Line::from("+ Deposit (d) | - Withdraw (w)"),
    ];
    if snap.submitting > 0 {
        lines.push(Line::from(format!(
            "{} transaction(s) awaiting confirmation",
            snap.submitting
        )));
    }
    let widget =
        Paragraph::new(lines).block(Block::default().borders(Borders::ALL).title("Account"));
    f.render_widget(widget, area);
}

fn draw_status(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let status_widget = if snap.errors.is_empty() {
        let status = if snap.status.trim().is_empty() {
            "Ready"
        } else {
            snap.status.as_str()
        };
        Paragraph::new(status)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Status"))
            .style(Style::default().fg(Color::Green))
    } else {
        let skip = snap.errors.len().saturating_sub(SHOWN_ERRORS);
        let mut lines = vec![Line::from(snap.status.clone()).fg(Color::Green)];
        for e in snap.errors.iter().skip(skip) {
            lines.push(Line::from(e.clone()));
        }
        Paragraph::new(lines)
            .wrap(Wrap { trim: false })
            .block(Block::default().borders(Borders::ALL).title("Errors"))
            .style(Style::default().fg(Color::Red))
    };
    f.render_widget(status_widget, area);
}

fn draw_help(f: &mut Frame, area: Rect, snap: &AppSnapshot) {
    let is_active = snap.view.is_some_and(|v| v.is_active());
    let actions = if is_active {
        "r vote red | b vote blue | "
    } else if snap.metrics.claimable() {
        "c claim | "
    } else {
        ""
    };
    let help = Paragraph::new(format!(
        "←/→ round | g latest | {actions}0-9 . ⌫ amount | d deposit | w withdraw | q/Esc quit"
    ))
    .block(Block::default().borders(Borders::ALL).title("Help"));
    f.render_widget(help, area);
}

fn format_credits(value: f64) -> String {
    let fixed = format!("{value:.3}");
    let trimmed = fixed.trim_end_matches('0').trim_end_matches('.');
    if trimmed == "-0" {
        String::from("0")
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use crossterm::event::KeyEvent;
    use ethers::types::Address;
    use red_vs_blue::{
        metrics::{
            Earnings,
            RoundMetrics,
        },
        round::RoundIndex,
        session::Session,
    };

    fn snapshot_at(block: u64, back: u32) -> AppSnapshot {
        let mut session = Session::new(RoundIndex::new(128).unwrap(), "100");
        session.observe(block);
        for _ in 0..back {
            session.go_to_previous();
        }
        AppSnapshot {
            contract: Address::zero(),
            view: session.view().copied(),
            blocks_left: None,
            can_go_previous: session.can_go_previous(),
            can_go_next: session.can_go_next(),
            metrics: RoundMetrics::empty(0),
            credit_balance: 0.0,
            tx_amount: String::from("100"),
            submitting: 0,
            status: String::new(),
            errors: Vec::new(),
        }
    }

    fn past_round_with(earnings: Earnings) -> AppSnapshot {
        let mut session = Session::new(RoundIndex::new(128).unwrap(), "100");
        session.observe(300);
        let ticket = session.go_to_previous().unwrap();
        session.apply_earnings(ticket, earnings);
        AppSnapshot {
            metrics: session.metrics().clone(),
            ..snapshot_at(300, 1)
        }
    }

    fn claim_key() -> Event {
        Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::NONE))
    }

    #[test]
    fn round_line__ongoing_first_round__has_no_affordances() {
        assert_eq!("Round: 0 [ongoing]", round_line(&snapshot_at(5, 0)));
    }

    #[test]
    fn round_line__past_round__offers_both_directions() {
        assert_eq!("Round: < 1 > latest", round_line(&snapshot_at(300, 1)));
    }

    #[test]
    fn round_line__ongoing_round__offers_only_previous() {
        assert_eq!("Round: < 2 [ongoing]", round_line(&snapshot_at(300, 0)));
    }

    #[test]
    fn format_credits__trims_trailing_zeros() {
        assert_eq!("100", format_credits(100.0));
        assert_eq!("0.3", format_credits(0.1 + 0.2));
        assert_eq!("-2.5", format_credits(-2.5));
    }

    #[test]
    fn interpret_event__vote_keys__only_while_active() {
        // given
        let mut state = UiState::default();
        let red = Event::Key(KeyEvent::new(KeyCode::Char('r'), KeyModifiers::NONE));

        // when
        let inactive = interpret_event(&mut state, red.clone());
        state.is_active = true;
        let active = interpret_event(&mut state, red);

        // then
        assert_eq!(None, inactive);
        assert_eq!(Some(UserEvent::Act(Action::Vote(Side::Red))), active);
    }

    #[test]
    fn interpret_event__ctrl_c__quits_instead_of_claiming() {
        let mut state = UiState::default();
        let ctrl_c = Event::Key(KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL));

        assert_eq!(Some(UserEvent::Quit), interpret_event(&mut state, ctrl_c));
    }

    #[test]
    fn interpret_event__claim_on_past_round_without_reward__is_ignored() {
        // given
        let mut state = UiState::default();
        draw(&mut state, &past_round_with(Earnings::default())).unwrap();

        // when
        let actual = interpret_event(&mut state, claim_key());

        // then
        assert_eq!(None, actual);
    }

    #[test]
    fn interpret_event__claim_on_already_claimed_round__is_ignored() {
        // given
        let mut state = UiState::default();
        let claimed = Earnings {
            reward: 10.0,
            bet: 5.0,
            claimed: true,
        };
        draw(&mut state, &past_round_with(claimed)).unwrap();

        // when
        let actual = interpret_event(&mut state, claim_key());

        // then
        assert_eq!(None, actual);
    }

    #[test]
    fn interpret_event__claim_on_past_round_with_unclaimed_reward__claims() {
        // given
        let mut state = UiState::default();
        let unclaimed = Earnings {
            reward: 10.0,
            bet: 5.0,
            claimed: false,
        };
        draw(&mut state, &past_round_with(unclaimed)).unwrap();

        // when
        let actual = interpret_event(&mut state, claim_key());

        // then
        assert_eq!(Some(UserEvent::Act(Action::Claim)), actual);
    }
}
