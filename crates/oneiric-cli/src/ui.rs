use std::io;
use std::time::Duration;

use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::{Backend, CrosstermBackend};
use ratatui::layout::{Alignment, Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Gauge, List, ListItem, ListState, Paragraph, Wrap};
use ratatui::Terminal;

use oneiric_core::collection::focused_index;
use oneiric_core::collection::project;
use oneiric_core::collection::Emphasis;
use oneiric_core::elements::aggregate;
use oneiric_core::elements::progress;
use oneiric_core::elements::tiles;
use oneiric_core::elements::TileState;
use oneiric_core::elements::CODEX_CATEGORIES;
use oneiric_core::elements::CODEX_SAMPLE_GOAL;
use oneiric_core::format_elapsed;
use oneiric_core::galaxy::star;
use oneiric_core::galaxy::ResonanceState;
use oneiric_core::galaxy::GALAXY_STARS;
use oneiric_core::AppState;
use oneiric_core::AppView;
use oneiric_core::CaptureStage;
use oneiric_core::Dream;
use oneiric_core::NoticeLevel;
use oneiric_core::UserAction;
use oneiric_core::VideoStatus;
use oneiric_core::MENU_VIEWS;
use oneiric_core::SYMBOL_SILENCE;

use crate::host::Host;

/// Terminal rows used by one dream card in the list.
const CARD_ROWS: u16 = 4;
const DELETE_PROMPT: &str = "确定要永久遗忘这个梦境吗？";

struct TuiGuard;

impl Drop for TuiGuard {
    fn drop(&mut self) {
        let _ = disable_raw_mode();
        let _ = execute!(io::stdout(), LeaveAlternateScreen, crossterm::cursor::Show);
    }
}

pub fn run(state: &mut AppState, host: &mut Host) -> Result<(), Box<dyn std::error::Error>> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen, crossterm::cursor::Hide)?;
    let _guard = TuiGuard;

    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;

    let result = run_app(&mut terminal, state, host);
    host.shutdown();
    result.map_err(|e| e.into())
}

/// Cursor positions and prompts that only matter to this front end.
#[derive(Debug, Default)]
struct UiState {
    menu_cursor: usize,
    codex_cursor: usize,
    tile_cursor: usize,
    star_cursor: usize,
    confirm_delete: Option<String>,
}

enum KeyHandlerResult {
    Continue,
    Exit,
}

#[derive(Clone, Copy)]
struct UiPalette {
    accent: Color,
    success: Color,
    warning: Color,
    danger: Color,
    muted: Color,
    border: Color,
    selected_bg: Color,
}

const PALETTE: UiPalette = UiPalette {
    accent: Color::Rgb(129, 140, 248),
    success: Color::LightGreen,
    warning: Color::Yellow,
    danger: Color::LightRed,
    muted: Color::DarkGray,
    border: Color::Rgb(67, 56, 202),
    selected_bg: Color::Rgb(30, 27, 75),
};

fn run_app<B: Backend>(
    terminal: &mut Terminal<B>,
    state: &mut AppState,
    host: &mut Host,
) -> io::Result<()> {
    let mut ui_state = UiState::default();

    loop {
        host.pump(state);
        terminal.draw(|f| ui(f, state, &ui_state))?;

        if event::poll(Duration::from_millis(16))? {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                match handle_key_event(key, state, host, &mut ui_state) {
                    KeyHandlerResult::Continue => {}
                    KeyHandlerResult::Exit => return Ok(()),
                }
            }
        }
    }
}

fn handle_key_event(
    key: event::KeyEvent,
    state: &mut AppState,
    host: &mut Host,
    ui_state: &mut UiState,
) -> KeyHandlerResult {
    if key.modifiers.contains(KeyModifiers::CONTROL) && key.code == KeyCode::Char('c') {
        return KeyHandlerResult::Exit;
    }

    if let Some(id) = ui_state.confirm_delete.clone() {
        match key.code {
            KeyCode::Char('y') | KeyCode::Enter => {
                ui_state.confirm_delete = None;
                host.user(state, UserAction::DeleteDream { id });
            }
            KeyCode::Char('n') | KeyCode::Esc => ui_state.confirm_delete = None,
            _ => {}
        }
        return KeyHandlerResult::Continue;
    }

    if state.routing.menu_open {
        handle_menu_keys(key, state, host, ui_state);
        return KeyHandlerResult::Continue;
    }

    match key.code {
        KeyCode::Esc => {
            escape(state, host);
            return KeyHandlerResult::Continue;
        }
        KeyCode::Char('m') => {
            host.user(state, UserAction::HeaderControl);
            return KeyHandlerResult::Continue;
        }
        KeyCode::Char('x') => {
            if let Some(seq) = state.notices.latest().map(|notice| notice.seq) {
                host.user(state, UserAction::DismissNotice { seq });
            }
            return KeyHandlerResult::Continue;
        }
        _ => {}
    }

    match state.routing.view {
        AppView::List => return handle_list_keys(key, state, host),
        AppView::Add => handle_add_keys(key, state, host),
        AppView::Detail => handle_detail_keys(key, state, host, ui_state),
        AppView::Profile => {
            if key.code == KeyCode::Char('p') {
                host.user(state, UserAction::TogglePro);
            }
        }
        AppView::Codex => handle_codex_keys(key, state, host, ui_state),
        AppView::Galaxy => handle_galaxy_keys(key, state, host, ui_state),
        AppView::About => {}
    }
    KeyHandlerResult::Continue
}

/// Closes the innermost thing on screen, falling back to regular back navigation.
fn escape(state: &mut AppState, host: &mut Host) {
    let action = if state.overlays.analysis_modal_open {
        UserAction::CloseAnalysis
    } else if state.overlays.galaxy_target.is_some() {
        UserAction::DismissGalaxyTarget
    } else if matches!(state.capture.stage, CaptureStage::Recording { .. }) {
        UserAction::CancelRecording
    } else {
        UserAction::Back
    };
    host.user(state, action);
}

fn handle_menu_keys(
    key: event::KeyEvent,
    state: &mut AppState,
    host: &mut Host,
    ui_state: &mut UiState,
) {
    match key.code {
        KeyCode::Esc | KeyCode::Char('m') => {
            host.user(state, UserAction::ToggleMenu);
        }
        KeyCode::Up | KeyCode::Char('k') => {
            ui_state.menu_cursor = ui_state.menu_cursor.saturating_sub(1);
        }
        KeyCode::Down | KeyCode::Char('j') => {
            ui_state.menu_cursor = (ui_state.menu_cursor + 1).min(MENU_VIEWS.len() - 1);
        }
        KeyCode::Enter => {
            let view = MENU_VIEWS[ui_state.menu_cursor.min(MENU_VIEWS.len() - 1)];
            host.user(state, UserAction::Navigate(view));
        }
        _ => {}
    }
}

fn handle_list_keys(key: event::KeyEvent, state: &mut AppState, host: &mut Host) -> KeyHandlerResult {
    let step = state.selection.layout.item_height;
    match key.code {
        KeyCode::Char('q') => return KeyHandlerResult::Exit,
        KeyCode::Up | KeyCode::Char('k') => {
            host.user(state, UserAction::ScrollCollection(-step));
        }
        KeyCode::Down | KeyCode::Char('j') => {
            host.user(state, UserAction::ScrollCollection(step));
        }
        KeyCode::Home => {
            host.user(state, UserAction::SetCollectionScroll(0.0));
        }
        KeyCode::End => {
            host.user(state, UserAction::SetCollectionScroll(f32::MAX));
        }
        KeyCode::Enter => {
            if let Some(id) = focused_dream(state).map(|dream| dream.id.clone()) {
                host.user(state, UserAction::SelectDream { id });
            }
        }
        KeyCode::Char('r') | KeyCode::Char(' ') => {
            host.user(state, UserAction::StartRecording);
        }
        KeyCode::Char('n') => {
            host.user(state, UserAction::ToggleResonanceNotice);
        }
        _ => {}
    }
    KeyHandlerResult::Continue
}

fn handle_add_keys(key: event::KeyEvent, state: &mut AppState, host: &mut Host) {
    let recording = matches!(state.capture.stage, CaptureStage::Recording { .. });
    let idle = state.capture.stage.is_idle();
    match key.code {
        KeyCode::Enter | KeyCode::Char(' ') if recording => {
            host.user(state, UserAction::StopRecording);
        }
        KeyCode::Enter | KeyCode::Char(' ') | KeyCode::Char('r') if idle => {
            host.user(state, UserAction::StartRecording);
        }
        _ => {}
    }
}

fn handle_detail_keys(
    key: event::KeyEvent,
    state: &mut AppState,
    host: &mut Host,
    ui_state: &mut UiState,
) {
    let Some(id) = state.selection.selected_dream.clone() else {
        return;
    };
    if state.overlays.analysis_modal_open {
        if key.code == KeyCode::Char('s') {
            host.user(state, UserAction::ShareAnalysis);
        }
        return;
    }
    match key.code {
        KeyCode::Char('v') => {
            host.user(state, UserAction::TriggerVideo { id });
        }
        KeyCode::Char('a') => {
            host.user(state, UserAction::OpenDeepAnalysis);
        }
        KeyCode::Char('s') => {
            host.user(state, UserAction::ShareDream { id });
        }
        KeyCode::Char('p') | KeyCode::Char(' ') => {
            host.user(state, UserAction::TogglePlayback { id });
        }
        KeyCode::Char('d') | KeyCode::Delete => ui_state.confirm_delete = Some(id),
        _ => {}
    }
}

fn handle_codex_keys(
    key: event::KeyEvent,
    state: &mut AppState,
    host: &mut Host,
    ui_state: &mut UiState,
) {
    if state.overlays.selected_element.is_some() {
        return;
    }
    match state.overlays.codex_category {
        None => match key.code {
            KeyCode::Left | KeyCode::Up | KeyCode::Char('h') | KeyCode::Char('k') => {
                ui_state.codex_cursor = ui_state.codex_cursor.saturating_sub(1);
            }
            KeyCode::Right | KeyCode::Down | KeyCode::Char('l') | KeyCode::Char('j') => {
                ui_state.codex_cursor = (ui_state.codex_cursor + 1).min(CODEX_CATEGORIES.len() - 1);
            }
            KeyCode::Enter => {
                ui_state.tile_cursor = 0;
                let category = CODEX_CATEGORIES[ui_state.codex_cursor.min(CODEX_CATEGORIES.len() - 1)];
                host.user(state, UserAction::OpenCodexCategory(category));
            }
            _ => {}
        },
        Some(category) => {
            let last = category.items().len().saturating_sub(1);
            match key.code {
                KeyCode::Left | KeyCode::Up | KeyCode::Char('h') | KeyCode::Char('k') => {
                    ui_state.tile_cursor = ui_state.tile_cursor.saturating_sub(1);
                }
                KeyCode::Right | KeyCode::Down | KeyCode::Char('l') | KeyCode::Char('j') => {
                    ui_state.tile_cursor = (ui_state.tile_cursor + 1).min(last);
                }
                KeyCode::Enter => {
                    if let Some(name) = category.items().get(ui_state.tile_cursor) {
                        host.user(
                            state,
                            UserAction::OpenElement {
                                name: (*name).to_string(),
                            },
                        );
                    }
                }
                _ => {}
            }
        }
    }
}

fn handle_galaxy_keys(
    key: event::KeyEvent,
    state: &mut AppState,
    host: &mut Host,
    ui_state: &mut UiState,
) {
    if state.overlays.galaxy_target.is_some() {
        if key.code == KeyCode::Enter {
            host.user(state, UserAction::SendResonance);
        }
        return;
    }
    match key.code {
        KeyCode::Left | KeyCode::Up | KeyCode::Char('h') | KeyCode::Char('k') => {
            ui_state.star_cursor = ui_state.star_cursor.saturating_sub(1);
        }
        KeyCode::Right | KeyCode::Down | KeyCode::Char('l') | KeyCode::Char('j') => {
            ui_state.star_cursor = (ui_state.star_cursor + 1).min(GALAXY_STARS.len() - 1);
        }
        KeyCode::Enter => {
            let star_id = GALAXY_STARS[ui_state.star_cursor.min(GALAXY_STARS.len() - 1)].id;
            host.user(
                state,
                UserAction::OpenGalaxyTarget {
                    star_id: star_id.to_string(),
                },
            );
        }
        KeyCode::Char('n') => {
            host.user(state, UserAction::ToggleResonanceNotice);
        }
        _ => {}
    }
}

fn focused_dream(state: &AppState) -> Option<&Dream> {
    let dreams = state.dreams.dreams();
    focused_index(state.selection.collection_scroll, dreams.len(), &state.selection.layout)
        .and_then(|index| dreams.get(index))
}

/// Parses `#rgb` / `#rrggbb`; anything else renders in the accent colour.
fn hex_color(value: &str) -> Option<Color> {
    let hex = value.strip_prefix('#')?;
    let channel = |s: &str| u8::from_str_radix(s, 16).ok();
    match hex.len() {
        3 => {
            let mut parts = hex.chars().map(|c| channel(&c.to_string()).map(|v| v * 17));
            Some(Color::Rgb(parts.next()??, parts.next()??, parts.next()??))
        }
        6 => Some(Color::Rgb(
            channel(hex.get(0..2)?)?,
            channel(hex.get(2..4)?)?,
            channel(hex.get(4..6)?)?,
        )),
        _ => None,
    }
}

fn emphasis_style(emphasis: Emphasis) -> Style {
    let mut style = if emphasis.opacity > 0.8 {
        Style::default().fg(Color::White)
    } else if emphasis.opacity > 0.55 {
        Style::default().fg(Color::Gray)
    } else {
        Style::default().fg(PALETTE.muted)
    };
    if emphasis.blur > 2.0 {
        style = style.add_modifier(Modifier::DIM);
    }
    if emphasis.scale >= 0.99 {
        style = style.add_modifier(Modifier::BOLD);
    }
    style
}

fn ui(f: &mut ratatui::Frame, state: &AppState, ui_state: &UiState) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Header
            Constraint::Min(0),    // Content
            Constraint::Length(1), // Notices
            Constraint::Length(1), // Footer
        ])
        .split(f.area());

    render_header(f, chunks[0], state);
    match state.routing.view {
        AppView::List => render_list(f, chunks[1], state),
        AppView::Add => render_add(f, chunks[1], state),
        AppView::Detail => render_detail(f, chunks[1], state),
        AppView::Profile => render_profile(f, chunks[1], state),
        AppView::Codex => render_codex(f, chunks[1], state, ui_state),
        AppView::Galaxy => render_galaxy(f, chunks[1], state, ui_state),
        AppView::About => render_about(f, chunks[1]),
    }
    render_notice(f, chunks[2], state);
    render_footer(f, chunks[3], state);

    if state.overlays.analysis_modal_open {
        render_analysis_modal(f, state);
    }
    if state.overlays.selected_element.is_some() {
        render_element_overlay(f, state);
    }
    if state.overlays.galaxy_target.is_some() {
        render_resonance_modal(f, state);
    }
    if state.routing.menu_open {
        render_menu(f, state, ui_state);
    }
    if ui_state.confirm_delete.is_some() {
        render_confirm_delete(f);
    }
}

fn render_header(f: &mut ratatui::Frame, area: Rect, state: &AppState) {
    let user = state.user();
    let tier = if user.is_pro {
        Span::styled(" PRO ", Style::default().fg(Color::Black).bg(PALETTE.warning))
    } else {
        Span::styled(" FREE ", Style::default().fg(PALETTE.muted))
    };
    let control = if state.overlays.innermost().is_some() {
        "‹ 返回"
    } else {
        "☰ 菜单"
    };
    let mut spans = vec![
        Span::styled(control, Style::default().fg(PALETTE.accent)),
        Span::raw("  "),
        Span::styled(
            "Oneiric",
            Style::default()
                .fg(PALETTE.accent)
                .add_modifier(Modifier::BOLD),
        ),
        Span::styled(
            format!(" · {}", state.routing.view.label()),
            Style::default().fg(Color::Gray),
        ),
        Span::raw("  "),
        Span::raw(user.name.clone()),
        Span::raw(" "),
        tier,
    ];
    if state.resonance_notice_visible {
        spans.push(Span::styled(
            "  ✦ 有人与你的梦产生了共鸣",
            Style::default().fg(PALETTE.warning),
        ));
    }
    let header = Paragraph::new(Line::from(spans)).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(PALETTE.border)),
    );
    f.render_widget(header, area);
}

fn render_list(f: &mut ratatui::Frame, area: Rect, state: &AppState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(PALETTE.border))
        .title(format!("梦境列表 ({})", state.dreams.len()));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let dreams = state.dreams.dreams();
    if dreams.is_empty() {
        let empty = Paragraph::new(vec![
            Line::from(""),
            Line::from("还没有记录任何梦境"),
            Line::from(Span::styled(
                "按 r 开始记录",
                Style::default().fg(PALETTE.muted),
            )),
        ])
        .alignment(Alignment::Center);
        f.render_widget(empty, inner);
        return;
    }

    let layout = &state.selection.layout;
    let scroll = state.selection.collection_scroll;
    let focused = focused_index(scroll, dreams.len(), layout).unwrap_or(0);
    let visible = (inner.height / CARD_ROWS).max(1) as usize;
    let first = focused.saturating_sub(visible / 2);

    let rows = project(dreams, scroll, layout);
    for (slot, row) in rows.iter().skip(first).take(visible).enumerate() {
        let card = Rect {
            x: inner.x,
            y: inner.y + slot as u16 * CARD_ROWS,
            width: inner.width,
            height: CARD_ROWS.min(inner.height.saturating_sub(slot as u16 * CARD_ROWS)),
        };
        if card.height == 0 {
            break;
        }
        render_card(f, card, row.dream, row.emphasis, row.index == focused);
    }
}

fn render_card(f: &mut ratatui::Frame, area: Rect, dream: &Dream, emphasis: Emphasis, focused: bool) {
    let style = emphasis_style(emphasis);
    let swatch = hex_color(&dream.color).unwrap_or(PALETTE.accent);
    let video = match dream.video_status {
        VideoStatus::Completed => "▶ 视频",
        VideoStatus::Processing => "… 生成中",
        VideoStatus::Failed => "✕ 视频失败",
        VideoStatus::Pending => "",
    };
    let mut block = Block::default()
        .borders(Borders::LEFT)
        .border_style(Style::default().fg(swatch));
    if focused {
        block = block.style(Style::default().bg(PALETTE.selected_bg));
    }
    let lines = vec![
        Line::from(vec![
            Span::styled(dream.title.clone(), style),
            Span::raw("  "),
            Span::styled(video, Style::default().fg(PALETTE.muted)),
        ]),
        Line::from(Span::styled(
            format!(
                "{}  {}",
                dream.date.format("%Y-%m-%d %H:%M"),
                dream.mood.as_deref().unwrap_or("")
            ),
            Style::default().fg(PALETTE.muted),
        )),
        Line::from(Span::styled(
            dream
                .elements
                .iter()
                .map(|element| format!("#{element}"))
                .collect::<Vec<_>>()
                .join(" "),
            style,
        )),
    ];
    f.render_widget(Paragraph::new(lines).block(block), area);
}

fn render_add(f: &mut ratatui::Frame, area: Rect, state: &AppState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(PALETTE.border))
        .title("记录梦境");
    let inner = block.inner(area);
    f.render_widget(block, area);

    let (headline, hint, ratio) = match &state.capture.stage {
        CaptureStage::Idle => ("准备好了吗？".to_string(), "Enter 开始录音", 0.0),
        CaptureStage::Recording { elapsed_secs, .. } => (
            format!("● 正在聆听  {}", format_elapsed(*elapsed_secs)),
            "Enter 结束并解析 · Esc 放弃",
            0.33,
        ),
        CaptureStage::Analyzing { .. } => ("正在解析梦境...".to_string(), "请稍候", 0.66),
        CaptureStage::Painting { .. } => ("正在绘制梦境画面...".to_string(), "请稍候", 0.9),
    };

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(2),
            Constraint::Length(1),
            Constraint::Length(2),
            Constraint::Min(0),
        ])
        .split(inner);
    f.render_widget(
        Paragraph::new(headline)
            .alignment(Alignment::Center)
            .style(Style::default().add_modifier(Modifier::BOLD)),
        chunks[0],
    );
    f.render_widget(
        Gauge::default()
            .gauge_style(Style::default().fg(PALETTE.accent))
            .label(state.capture.stage.label())
            .ratio(ratio),
        chunks[1],
    );
    f.render_widget(
        Paragraph::new(hint)
            .alignment(Alignment::Center)
            .style(Style::default().fg(PALETTE.muted)),
        chunks[2],
    );
}

fn render_detail(f: &mut ratatui::Frame, area: Rect, state: &AppState) {
    let Some(dream) = state.selected_dream() else {
        f.render_widget(
            Paragraph::new("这个梦境已经消散了").alignment(Alignment::Center),
            area,
        );
        return;
    };
    let swatch = hex_color(&dream.color).unwrap_or(PALETTE.accent);
    let playing = state
        .playback
        .as_ref()
        .is_some_and(|playback| playback.dream_id == dream.id);

    let mut lines = vec![
        Line::from(Span::styled(
            dream.title.clone(),
            Style::default().fg(swatch).add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!(
                "{}  {}",
                dream.date.format("%Y年%m月%d日 %H:%M"),
                dream.mood.as_deref().unwrap_or("")
            ),
            Style::default().fg(PALETTE.muted),
        )),
        Line::from(""),
    ];
    if let Some(image) = dream.image_url.as_deref() {
        lines.push(Line::from(vec![
            Span::styled("画面  ", Style::default().fg(PALETTE.muted)),
            Span::raw(image.to_string()),
        ]));
    }
    let video = match (dream.video_status, dream.video_url.as_deref()) {
        (VideoStatus::Completed, Some(url)) => url.to_string(),
        (VideoStatus::Processing, _) => "正在生成...".to_string(),
        (VideoStatus::Failed, _) => "生成失败，按 v 重试".to_string(),
        _ => "按 v 生成动态影像".to_string(),
    };
    lines.push(Line::from(vec![
        Span::styled("影像  ", Style::default().fg(PALETTE.muted)),
        Span::raw(video),
    ]));
    lines.push(Line::from(vec![
        Span::styled("录音  ", Style::default().fg(PALETTE.muted)),
        Span::raw(if playing { "■ 播放中" } else { "▶ 播放" }),
    ]));
    lines.push(Line::from(""));
    for point in &dream.key_points {
        lines.push(Line::from(format!("· {point}")));
    }
    lines.push(Line::from(""));
    lines.push(Line::from(dream.interpretation.clone()));
    lines.push(Line::from(""));
    lines.push(Line::from(Span::styled(
        dream
            .elements
            .iter()
            .map(|element| format!("#{element}"))
            .collect::<Vec<_>>()
            .join(" "),
        Style::default().fg(PALETTE.accent),
    )));
    if state.enrichment.deep_analysis_in_flight.contains(&dream.id) {
        lines.push(Line::from(Span::styled(
            "深度解读生成中...",
            Style::default().fg(PALETTE.warning),
        )));
    }

    let detail = Paragraph::new(lines).wrap(Wrap { trim: false }).block(
        Block::default()
            .borders(Borders::ALL)
            .border_style(Style::default().fg(swatch))
            .title("梦境详情"),
    );
    f.render_widget(detail, area);
}

fn render_profile(f: &mut ratatui::Frame, area: Rect, state: &AppState) {
    let user = state.user();
    let index = aggregate(state.dreams.dreams());
    let lines = vec![
        Line::from(Span::styled(
            user.name.clone(),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            if user.is_pro { "专业会员" } else { "免费账户" },
            Style::default().fg(if user.is_pro {
                PALETTE.warning
            } else {
                PALETTE.muted
            }),
        )),
        Line::from(""),
        Line::from(format!("已记录梦境  {}", state.dreams.len())),
        Line::from(format!("已收集符号  {}", index.len())),
        Line::from(""),
        Line::from(Span::styled(
            "按 p 切换会员状态",
            Style::default().fg(PALETTE.muted),
        )),
    ];
    f.render_widget(
        Paragraph::new(lines).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(PALETTE.border))
                .title("个人档案"),
        ),
        area,
    );
}

fn render_codex(f: &mut ratatui::Frame, area: Rect, state: &AppState, ui_state: &UiState) {
    let index = aggregate(state.dreams.dreams());
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(PALETTE.border))
        .title(format!("梦境图鉴  {} / {}", index.len(), CODEX_SAMPLE_GOAL));
    let inner = block.inner(area);
    f.render_widget(block, area);

    let Some(category) = state.overlays.codex_category else {
        let items: Vec<ListItem> = CODEX_CATEGORIES
            .iter()
            .map(|category| {
                let (collected, total) = progress(*category, &index);
                ListItem::new(vec![
                    Line::from(vec![
                        Span::styled(
                            category.label(),
                            Style::default().add_modifier(Modifier::BOLD),
                        ),
                        Span::styled(
                            format!("  {collected}/{total}"),
                            Style::default().fg(PALETTE.accent),
                        ),
                    ]),
                    Line::from(Span::styled(
                        category.description(),
                        Style::default().fg(PALETTE.muted),
                    )),
                ])
            })
            .collect();
        let mut list_state = ListState::default();
        list_state.select(Some(ui_state.codex_cursor.min(CODEX_CATEGORIES.len() - 1)));
        let list = List::new(items)
            .highlight_style(Style::default().bg(PALETTE.selected_bg))
            .highlight_symbol("› ");
        f.render_stateful_widget(list, inner, &mut list_state);
        return;
    };

    let (collected, total) = progress(category, &index);
    let items: Vec<ListItem> = tiles(category, &index)
        .into_iter()
        .map(|tile| {
            let line = match tile.state {
                TileState::Locked => Line::from(Span::styled(
                    "？ 未解锁",
                    Style::default().fg(PALETTE.muted),
                )),
                TileState::Collected => Line::from(format!(
                    "{}  ×{}",
                    tile.name,
                    tile.entry.map_or(0, |entry| entry.count)
                )),
                TileState::Mastered => Line::from(vec![
                    Span::styled("★ ", Style::default().fg(PALETTE.warning)),
                    Span::styled(
                        format!(
                            "{}  ×{}",
                            tile.name,
                            tile.entry.map_or(0, |entry| entry.count)
                        ),
                        Style::default().add_modifier(Modifier::BOLD),
                    ),
                ]),
            };
            ListItem::new(line)
        })
        .collect();
    let mut list_state = ListState::default();
    list_state.select(Some(ui_state.tile_cursor));
    let list = List::new(items)
        .block(Block::default().title(format!("{}  {collected}/{total}", category.label())))
        .highlight_style(Style::default().bg(PALETTE.selected_bg))
        .highlight_symbol("› ");
    f.render_stateful_widget(list, inner, &mut list_state);
}

fn render_element_overlay(f: &mut ratatui::Frame, state: &AppState) {
    let Some(selection) = state.overlays.selected_element.as_ref() else {
        return;
    };
    let area = centered_rect(60, 50, f.area());
    let analysis = if selection.loading {
        Span::styled("正在解读...", Style::default().fg(PALETTE.muted))
    } else {
        Span::raw(
            selection
                .analysis
                .clone()
                .unwrap_or_else(|| SYMBOL_SILENCE.to_string()),
        )
    };
    let lines = vec![
        Line::from(vec![
            Span::styled(
                selection.name.clone(),
                Style::default().add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!("  出现 {} 次", selection.count),
                Style::default().fg(PALETTE.accent),
            ),
        ]),
        Line::from(Span::styled(
            format!("初次相遇 {}", selection.first_seen.format("%Y-%m-%d")),
            Style::default().fg(PALETTE.muted),
        )),
        Line::from(
            selection
                .image_url
                .clone()
                .unwrap_or_default(),
        ),
        Line::from(""),
        Line::from(analysis),
    ];
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(PALETTE.accent))
                .title("符号"),
        ),
        area,
    );
}

fn render_galaxy(f: &mut ratatui::Frame, area: Rect, state: &AppState, ui_state: &UiState) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_style(Style::default().fg(PALETTE.border))
        .title("共鸣星海");
    let inner = block.inner(area);
    f.render_widget(block, area);
    if inner.width < 4 || inner.height < 3 {
        return;
    }

    let latest = state.dreams.dreams().iter().max_by_key(|dream| dream.date);
    let centre = latest.map_or("今夜的梦", |dream| dream.title.as_str());
    let centre_area = Rect {
        x: inner.x,
        y: inner.y + inner.height / 2,
        width: inner.width,
        height: 1,
    };
    f.render_widget(
        Paragraph::new(format!("✦ {centre}"))
            .alignment(Alignment::Center)
            .style(Style::default().add_modifier(Modifier::BOLD)),
        centre_area,
    );

    for (i, star) in GALAXY_STARS.iter().enumerate() {
        let x = inner.x + (u32::from(inner.width.saturating_sub(12)) * u32::from(star.x) / 100) as u16;
        let y = inner.y + (u32::from(inner.height.saturating_sub(1)) * u32::from(star.y) / 100) as u16;
        let label = star.keywords.first().copied().unwrap_or("");
        let mut style = Style::default().fg(hex_color(star.color).unwrap_or(PALETTE.accent));
        if i == ui_state.star_cursor {
            style = style.add_modifier(Modifier::BOLD | Modifier::REVERSED);
        }
        let width = (label.chars().count() as u16 * 2 + 2).min(inner.width);
        let rect = Rect {
            x,
            y,
            width: width.min(inner.x + inner.width - x),
            height: 1,
        };
        f.render_widget(Paragraph::new(format!("● {label}")).style(style), rect);
    }
}

fn render_resonance_modal(f: &mut ratatui::Frame, state: &AppState) {
    let Some(target) = state.overlays.galaxy_target.as_ref() else {
        return;
    };
    let Some(star) = star(target.star_id) else {
        return;
    };
    let area = centered_rect(50, 40, f.area());
    let status = match target.resonance {
        ResonanceState::Idle => Span::styled("Enter 发送共鸣", Style::default().fg(PALETTE.accent)),
        ResonanceState::Sending => Span::styled("共鸣发送中...", Style::default().fg(PALETTE.warning)),
        ResonanceState::Sent => Span::styled("共鸣已送达", Style::default().fg(PALETTE.success)),
    };
    let lines = vec![
        Line::from(Span::styled(
            star.keywords.join(" "),
            Style::default()
                .fg(hex_color(star.color).unwrap_or(PALETTE.accent))
                .add_modifier(Modifier::BOLD),
        )),
        Line::from(Span::styled(
            format!("{} · 约 {:.1} 光年", star.location, star.distance),
            Style::default().fg(PALETTE.muted),
        )),
        Line::from(""),
        Line::from(status),
    ];
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(lines).alignment(Alignment::Center).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(PALETTE.accent))
                .title("遥远的梦"),
        ),
        area,
    );
}

fn render_about(f: &mut ratatui::Frame, area: Rect) {
    let lines = vec![
        Line::from(Span::styled(
            format!("Oneiric {}", env!("CARGO_PKG_VERSION")),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(""),
        Line::from("醒来后说出你的梦，Oneiric 会为它命名、解读并绘制画面。"),
        Line::from("所有记录都保存在本机。"),
    ];
    f.render_widget(
        Paragraph::new(lines).wrap(Wrap { trim: false }).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(PALETTE.border))
                .title("关于应用"),
        ),
        area,
    );
}

fn render_analysis_modal(f: &mut ratatui::Frame, state: &AppState) {
    let Some(dream) = state.selected_dream() else {
        return;
    };
    let area = centered_rect(70, 70, f.area());
    let text = dream
        .detailed_analysis
        .clone()
        .unwrap_or_else(|| "正在解读...".to_string());
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(text).wrap(Wrap { trim: false }).block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(PALETTE.accent))
                .title(format!("深度解读 · {}", dream.title))
                .title_bottom("s 分享 · Esc 关闭"),
        ),
        area,
    );
}

fn render_menu(f: &mut ratatui::Frame, state: &AppState, ui_state: &UiState) {
    let area = centered_rect(40, 40, f.area());
    let items: Vec<ListItem> = MENU_VIEWS
        .iter()
        .map(|view| {
            let style = if *view == state.routing.view {
                Style::default().fg(PALETTE.accent)
            } else {
                Style::default()
            };
            ListItem::new(Span::styled(view.label(), style))
        })
        .collect();
    let mut list_state = ListState::default();
    list_state.select(Some(ui_state.menu_cursor.min(MENU_VIEWS.len() - 1)));
    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(PALETTE.accent))
                .title("菜单"),
        )
        .highlight_style(Style::default().bg(PALETTE.selected_bg))
        .highlight_symbol("› ");
    f.render_widget(Clear, area);
    f.render_stateful_widget(list, area, &mut list_state);
}

fn render_confirm_delete(f: &mut ratatui::Frame) {
    let area = centered_rect(40, 20, f.area());
    f.render_widget(Clear, area);
    f.render_widget(
        Paragraph::new(vec![
            Line::from(DELETE_PROMPT),
            Line::from(""),
            Line::from(Span::styled(
                "y 确定 · n 取消",
                Style::default().fg(PALETTE.muted),
            )),
        ])
        .alignment(Alignment::Center)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .border_style(Style::default().fg(PALETTE.danger)),
        ),
        area,
    );
}

fn render_notice(f: &mut ratatui::Frame, area: Rect, state: &AppState) {
    let Some(notice) = state.notices.latest() else {
        return;
    };
    let color = match notice.level {
        NoticeLevel::Info => PALETTE.accent,
        NoticeLevel::Success => PALETTE.success,
        NoticeLevel::Error => PALETTE.danger,
    };
    f.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(notice.message.to_string(), Style::default().fg(color)),
            Span::styled("  (x 关闭)", Style::default().fg(PALETTE.muted)),
        ])),
        area,
    );
}

fn render_footer(f: &mut ratatui::Frame, area: Rect, state: &AppState) {
    let hints = match state.routing.view {
        AppView::List => "↑↓ 浏览 · Enter 查看 · r 记录 · n 共鸣 · m 菜单 · q 退出",
        AppView::Add => "Enter 开始/结束 · Esc 放弃",
        AppView::Detail if state.overlays.analysis_modal_open => "s 分享 · Esc 关闭",
        AppView::Detail => "p 播放 · v 视频 · a 解读 · s 分享 · d 删除 · Esc 返回",
        AppView::Profile => "p 切换会员 · Esc 返回",
        AppView::Codex => "↑↓ 选择 · Enter 打开 · m/Esc 返回",
        AppView::Galaxy => "←→ 选择 · Enter 共鸣 · n 说明 · Esc 返回",
        AppView::About => "Esc 返回",
    };
    f.render_widget(
        Paragraph::new(hints).style(Style::default().fg(PALETTE.muted)),
        area,
    );
}

fn centered_rect(percent_x: u16, percent_y: u16, r: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(r);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}
