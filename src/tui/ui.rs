//! UI rendering using ratatui
//!
//! Supports multiple screens:
//! - Roster: players, picks for the next table, leaderboard
//! - Board: the match in progress with its rounds
//! - Result: final records of a match that just ended
//! - Archive: ended matches and their rounds
//! - Error: error message display

use crate::app::{banner_text, AppCoordinator, Board, NameInput, NameMode, Screen};
use crate::game::rounds::Round;
use crate::game::{Count, PlayerRoundState, Status};
use crate::session::{MatchArchive, TABLE_SIZE};
use crate::stats::{MatchResult, StatsTracker};
use crate::storage::{Match, Player};
use ratatui::{
    prelude::*,
    widgets::{Block, Borders, Cell, List, ListItem, Paragraph, Row, Table},
};

/// Render the appropriate screen based on app state
pub fn render(frame: &mut Frame, coordinator: &AppCoordinator) {
    match &coordinator.screen {
        Screen::Roster {
            players,
            leaderboard,
            stats,
            selected,
            picks,
            input,
            notice,
        } => {
            render_roster(
                frame,
                players,
                leaderboard,
                stats,
                *selected,
                picks,
                input.as_ref(),
                notice,
            );
        }
        Screen::Board(board) => render_board(frame, board),
        Screen::Result { result } => render_result(frame, result),
        Screen::Archive {
            matches,
            selected,
            details,
        } => match details {
            Some(archive) => render_archive_details(frame, archive),
            None => render_archive(frame, matches, *selected),
        },
        Screen::Error { message } => render_error(frame, message),
    }
}

/// Render the title bar shared by every screen
fn render_title(frame: &mut Frame, area: Rect, right: &str) {
    let block = Block::default()
        .borders(Borders::BOTTOM)
        .border_style(Style::default().fg(Color::DarkGray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let header_layout = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(10), // Logo
            Constraint::Min(0),     // Right-hand text
        ])
        .split(inner);

    let logo = Paragraph::new("GAPLE")
        .style(Style::default().fg(Color::Yellow).bold())
        .alignment(Alignment::Left);
    frame.render_widget(logo, header_layout[0]);

    let text = Paragraph::new(right.to_string())
        .style(Style::default().fg(Color::Cyan).bold())
        .alignment(Alignment::Right);
    frame.render_widget(text, header_layout[1]);
}

fn render_footer(frame: &mut Frame, area: Rect, keys: &str) {
    let footer = Paragraph::new(keys.to_string())
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    frame.render_widget(footer, area);
}

/// Render the roster screen
#[allow(clippy::too_many_arguments)]
fn render_roster(
    frame: &mut Frame,
    players: &[Player],
    leaderboard: &[Player],
    stats: &StatsTracker,
    selected: usize,
    picks: &[i64],
    input: Option<&NameInput>,
    notice: &str,
) {
    let area = frame.area();

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(6),    // Players | leaderboard
            Constraint::Length(1), // Prompt or notice
            Constraint::Length(2), // Footer
        ])
        .margin(1)
        .split(area);

    render_title(frame, layout[0], &format!("Table {}/{}", picks.len(), TABLE_SIZE));

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(50), Constraint::Percentage(50)])
        .split(layout[1]);

    // Player list with seat numbers for picked players
    let items: Vec<ListItem> = players
        .iter()
        .enumerate()
        .map(|(i, player)| {
            let seat = picks.iter().position(|&id| id == player.id);
            let marker = match seat {
                Some(s) => format!("[{}]", s + 1),
                None => "[ ]".to_string(),
            };
            let style = if i == selected {
                Style::default().fg(Color::Yellow).bold()
            } else if seat.is_some() {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default().fg(Color::White)
            };
            let prefix = if i == selected { "> " } else { "  " };
            ListItem::new(format!("{}{} {}", prefix, marker, player.name)).style(style)
        })
        .collect();

    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Players"));
    frame.render_widget(list, columns[0]);

    render_leaderboard(frame, columns[1], leaderboard, stats);

    match input {
        Some(input) => {
            let label = match input.mode {
                NameMode::Add => "New player",
                NameMode::Rename(_) => "Rename",
            };
            let prompt = Paragraph::new(format!("{}: [{}]_", label, input.text))
                .style(Style::default().fg(Color::Cyan));
            frame.render_widget(prompt, layout[2]);
        }
        None => {
            let (text, color) = format_feedback(notice);
            frame.render_widget(Paragraph::new(text).style(Style::default().fg(color)), layout[2]);
        }
    }

    let keys = if input.is_some() {
        "Enter Save  Esc Cancel"
    } else {
        "↑↓ Move  Space Pick  a Add  r Rename  d Delete  Enter Start  h Archive  Esc Quit"
    };
    render_footer(frame, layout[3], keys);
}

/// Render lifetime totals, already ranked by the store
fn render_leaderboard(frame: &mut Frame, area: Rect, ranked: &[Player], stats: &StatsTracker) {
    let rows: Vec<Row> = ranked
        .iter()
        .enumerate()
        .map(|(i, player)| {
            let played = stats.get(&player.name);
            let style = if i == 0 && player.total_wins > 0 {
                Style::default().fg(Color::Yellow)
            } else {
                Style::default().fg(Color::White)
            };
            Row::new(vec![
                Cell::from(player.name.clone()),
                Cell::from(player.total_wins.to_string()),
                Cell::from(player.total_losses.to_string()),
                Cell::from(played.map_or(0, |s| s.matches_won).to_string()),
                Cell::from(played.map_or(0, |s| s.matches_played).to_string()),
            ])
            .style(style)
        })
        .collect();

    let table = Table::new(
        rows,
        [
            Constraint::Min(10),
            Constraint::Length(4),
            Constraint::Length(4),
            Constraint::Length(4),
            Constraint::Length(4),
        ],
    )
    .header(
        Row::new(vec!["Name", "TTD", "RT", "Won", "Pld"])
            .style(Style::default().fg(Color::DarkGray)),
    )
    .block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title("Leaderboard"),
    );
    frame.render_widget(table, area);
}

/// Render the board for the match in progress
fn render_board(frame: &mut Frame, board: &Board) {
    let area = frame.area();
    let session = board.session();

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(7), // Seats
            Constraint::Length(1), // Banner
            Constraint::Min(4),    // Rounds | events
            Constraint::Length(1), // Feedback
            Constraint::Length(2), // Footer
        ])
        .split(area);

    render_title(frame, layout[0], &format!("Match #{}", session.match_id()));
    render_seats(frame, layout[1], session.players(), board.selected);

    let banner = Paragraph::new(board.banner().unwrap_or_default())
        .style(Style::default().fg(Color::Magenta).bold())
        .alignment(Alignment::Center);
    frame.render_widget(banner, layout[2]);

    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Min(30), Constraint::Length(32)])
        .split(layout[3]);

    let rounds: Vec<Round> = session.rounds().collect();
    render_rounds(frame, columns[0], &session.player_names(), &rounds);

    let events: Vec<ListItem> = board
        .event_feed
        .iter()
        .rev()
        .map(|event| ListItem::new(banner_text(event)).style(Style::default().fg(Color::Green)))
        .collect();
    let feed = List::new(events).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(Color::DarkGray))
            .title("Events"),
    );
    frame.render_widget(feed, columns[1]);

    let (feedback_text, feedback_color) = if board.confirming_end {
        ("End this match? y to confirm, Esc to keep playing".to_string(), Color::Yellow)
    } else {
        format_feedback(&board.feedback)
    };
    frame.render_widget(
        Paragraph::new(feedback_text).style(Style::default().fg(feedback_color)),
        layout[4],
    );

    render_footer(
        frame,
        layout[5],
        "←→ Seat  a +1  s +2  t TTD  u Undo  e End  Esc Quit",
    );
}

/// One column per seat
fn render_seats(frame: &mut Frame, area: Rect, players: &[PlayerRoundState], selected: usize) {
    let constraints: Vec<Constraint> = players
        .iter()
        .map(|_| Constraint::Ratio(1, players.len().max(1) as u32))
        .collect();
    let columns = Layout::default()
        .direction(Direction::Horizontal)
        .constraints(constraints)
        .split(area);

    for (i, (player, column)) in players.iter().zip(columns.iter()).enumerate() {
        let border = if i == selected {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default().fg(Color::DarkGray)
        };
        let count = if player.current.is_baseline() {
            "-".to_string()
        } else {
            player.current.as_str().to_string()
        };
        let lines = vec![
            Line::from(count).style(Style::default().fg(Color::White).bold()),
            Line::from(status_badge(player.status)).style(status_style(player.status)),
            Line::from(format!("TTD {}  RT {}", player.match_wins, player.match_losses)),
            Line::from(format!("streak {}", player.rt_streak))
                .style(Style::default().fg(Color::DarkGray)),
        ];
        let seat = Paragraph::new(lines).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(border)
                .title(player.name.clone()),
        );
        frame.render_widget(seat, *column);
    }
}

/// Round table: one row per round, one column per player
fn render_rounds(frame: &mut Frame, area: Rect, names: &[String], rounds: &[Round]) {
    let mut header = vec!["#".to_string()];
    header.extend(names.iter().cloned());

    let rows: Vec<Row> = rounds
        .iter()
        .map(|round| {
            let mut cells = vec![Cell::from(if round.in_progress {
                "now".to_string()
            } else {
                round.number.to_string()
            })];
            for name in names {
                cells.push(Cell::from(format_count(round.count_for(name))));
            }
            let style = if round.in_progress {
                Style::default().fg(Color::Cyan)
            } else {
                Style::default().fg(Color::White)
            };
            Row::new(cells).style(style)
        })
        .collect();

    let mut widths = vec![Constraint::Length(4)];
    widths.extend(names.iter().map(|_| Constraint::Min(6)));

    let table = Table::new(rows, widths)
        .header(Row::new(header).style(Style::default().fg(Color::DarkGray)))
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(Color::DarkGray))
                .title("Rounds"),
        );
    frame.render_widget(table, area);
}

/// Render the result of a match that just ended
fn render_result(frame: &mut Frame, result: &MatchResult) {
    let area = frame.area();

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Length(2), // Winner
            Constraint::Min(6),    // Standings
            Constraint::Length(2), // Footer
        ])
        .margin(1)
        .split(area);

    render_title(frame, layout[0], &format!("Match #{} ended", result.match_id));
    render_winner(frame, layout[1], result.winner());

    let items: Vec<ListItem> = result
        .standings()
        .iter()
        .map(|record| {
            ListItem::new(format!(
                "  {:<16} TTD {:>3}   RT {:>3}",
                record.name, record.wins, record.losses
            ))
        })
        .collect();
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Standings"));
    frame.render_widget(list, layout[2]);

    render_footer(frame, layout[3], "Esc Back to roster");
}

fn render_winner(frame: &mut Frame, area: Rect, winner: Option<&str>) {
    let (text, color) = match winner {
        Some(name) => (format!("Winner: {}", name), Color::Yellow),
        None => ("No winner (tie)".to_string(), Color::DarkGray),
    };
    let widget = Paragraph::new(text)
        .style(Style::default().fg(color).bold())
        .alignment(Alignment::Center);
    frame.render_widget(widget, area);
}

/// Render the list of ended matches
fn render_archive(frame: &mut Frame, matches: &[Match], selected: usize) {
    let area = frame.area();

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(6),    // Match list
            Constraint::Length(2), // Footer
        ])
        .margin(1)
        .split(area);

    render_title(frame, layout[0], "Match archive");

    if matches.is_empty() {
        let empty = Paragraph::new("No ended matches yet")
            .style(Style::default().fg(Color::DarkGray))
            .alignment(Alignment::Center);
        frame.render_widget(empty, layout[1]);
    } else {
        let items: Vec<ListItem> = matches
            .iter()
            .enumerate()
            .map(|(i, m)| {
                let style = if i == selected {
                    Style::default().fg(Color::Yellow).bold()
                } else {
                    Style::default().fg(Color::White)
                };
                let prefix = if i == selected { "> " } else { "  " };
                let duration = m
                    .ended_at
                    .map(|end| format_duration(end - m.started_at))
                    .unwrap_or_default();
                ListItem::new(format!("{}Match #{}  {}", prefix, m.id, duration)).style(style)
            })
            .collect();
        let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Matches"));
        frame.render_widget(list, layout[1]);
    }

    render_footer(frame, layout[2], "↑↓ Select  Enter Open  Esc Back");
}

/// Render one ended match: records, winner and rounds
fn render_archive_details(frame: &mut Frame, archive: &MatchArchive) {
    let area = frame.area();
    let names: Vec<String> = archive.result.records.iter().map(|r| r.name.clone()).collect();

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),                                        // Header
            Constraint::Length(2),                                        // Winner
            Constraint::Length(archive.result.records.len() as u16 + 2), // Records
            Constraint::Min(4),                                           // Rounds
            Constraint::Length(2),                                        // Footer
        ])
        .margin(1)
        .split(area);

    render_title(frame, layout[0], &format!("Match #{}", archive.info.id));
    render_winner(frame, layout[1], archive.winner());

    let items: Vec<ListItem> = archive
        .result
        .records
        .iter()
        .map(|r| ListItem::new(format!("  {:<16} TTD {:>3}   RT {:>3}", r.name, r.wins, r.losses)))
        .collect();
    let list = List::new(items).block(Block::default().borders(Borders::ALL).title("Players"));
    frame.render_widget(list, layout[2]);

    render_rounds(frame, layout[3], &names, &archive.rounds);
    render_footer(frame, layout[4], "Esc Back");
}

/// Render error screen
fn render_error(frame: &mut Frame, message: &str) {
    let area = frame.area();

    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage(40),
            Constraint::Length(3),
            Constraint::Length(2),
            Constraint::Percentage(40),
        ])
        .margin(2)
        .split(area);

    let error = Paragraph::new(format!("Error: {}", message))
        .style(Style::default().fg(Color::Red))
        .alignment(Alignment::Center);
    frame.render_widget(error, layout[1]);

    let hint = Paragraph::new("Press Esc to go back")
        .style(Style::default().fg(Color::DarkGray))
        .alignment(Alignment::Center);
    frame.render_widget(hint, layout[2]);
}

fn status_badge(status: Status) -> &'static str {
    match status {
        Status::Normal => "",
        Status::Rw => "RW",
        Status::Kades => "KADES",
    }
}

fn status_style(status: Status) -> Style {
    match status {
        Status::Normal => Style::default(),
        Status::Rw => Style::default().fg(Color::Yellow).bold(),
        Status::Kades => Style::default().fg(Color::Red).bold(),
    }
}

/// Format a round cell; baseline shows as a dash
fn format_count(count: Option<Count>) -> String {
    match count {
        Some(count) if !count.is_baseline() => count.to_string(),
        _ => "-".to_string(),
    }
}

/// Format a duration given in milliseconds
fn format_duration(millis: i64) -> String {
    let minutes = millis.max(0) / 60_000;
    format!("{}h{:02}m", minutes / 60, minutes % 60)
}

/// Format feedback with appropriate color
fn format_feedback(feedback: &str) -> (String, Color) {
    if feedback.is_empty() {
        return (String::new(), Color::White);
    }

    let color = if feedback.starts_with("OK") || feedback.starts_with("Saved") {
        Color::Green
    } else if feedback.starts_with("NOT SAVED") {
        Color::Red
    } else {
        Color::Yellow
    };

    (feedback.to_string(), color)
}
