use hotspot_core::Kpi;
use hotspot_core::palette::{Ramp, Rgb, Scale};
use hotspot_pipeline::plot::REFERENCE_TOWNS;
use ratatui::{
    prelude::*,
    symbols::Marker,
    widgets::{
        Block, Borders, Cell, List, ListItem, ListState, Paragraph, Row, Table, TableState, Wrap,
        canvas::{Canvas, Context, Line as CanvasLine, Points},
    },
};

use crate::app::{App, Granularity, Screen};

const DENSITY_BUCKETS: u32 = 5;

pub(crate) fn draw(frame: &mut Frame<'_>, app: &App) {
    let area = frame.area();

    // Outer layout: title, main content, status line
    let layout_chunks = Layout::default()
        .direction(Direction::Vertical)
        .margin(1)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    let chunks = layout_chunks.as_ref();
    let [header_area, content_area, status_area] = chunks else {
        return;
    };

    let header = Paragraph::new("hotspot · tourism density in South Tyrol")
        .block(Block::default().borders(Borders::ALL).title("Hotspot"));
    frame.render_widget(header, *header_area);

    match app.screen {
        Screen::GranularitySelect => draw_granularity_select(frame, app, *content_area),
        Screen::KpiSelect => draw_kpi_select(frame, app, *content_area),
        Screen::MapView => match app.granularity {
            Granularity::Municipality => draw_municipality_view(frame, app, *content_area),
            Granularity::Gps => draw_gps_view(frame, app, *content_area),
        },
    }

    let nav_hint = match (app.screen, app.granularity) {
        (Screen::GranularitySelect, _) => "↑/↓ move · Enter select view · r reload · q/Ctrl-C quit",
        (Screen::KpiSelect, _) => "↑/↓ move · Enter show map · Esc/← back · q/Ctrl-C quit",
        (Screen::MapView, Granularity::Municipality) => {
            "↑/↓ select municipality · t toggle all KPIs · Esc/←/b back · r reload · q quit"
        }
        (Screen::MapView, Granularity::Gps) => {
            "t toggle establishments · Esc/←/b back · r reload · q quit"
        }
    };

    let status_text = match &app.error_message {
        Some(msg) => format!("{msg} · {nav_hint}"),
        None => nav_hint.to_owned(),
    };
    let status_style = if app.error_message.is_some() {
        Style::default().fg(Color::Red)
    } else {
        Style::default()
    };

    let status = Paragraph::new(status_text)
        .block(Block::default().borders(Borders::ALL).title("Status"))
        .style(status_style)
        .wrap(Wrap { trim: true });
    frame.render_widget(status, *status_area);
}

fn draw_granularity_select(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let items = Granularity::ALL
        .iter()
        .map(|granularity| ListItem::new(granularity.label()))
        .collect::<Vec<ListItem<'_>>>();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Choose the granularity of the map"),
        )
        .highlight_symbol("> ")
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let mut state = ListState::default();
    state.select(Some(app.granularity_index));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_kpi_select(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let items = Kpi::ALL
        .iter()
        .map(|kpi| ListItem::new(kpi.label()))
        .collect::<Vec<ListItem<'_>>>();

    let list = List::new(items)
        .block(
            Block::default()
                .borders(Borders::ALL)
                .title("Choose the KPI (↑/↓, Enter)"),
        )
        .highlight_symbol("> ")
        .highlight_style(
            Style::default()
                .fg(Color::Yellow)
                .add_modifier(Modifier::BOLD),
        );

    let mut state = ListState::default();
    state.select(Some(app.kpi_index));
    frame.render_stateful_widget(list, area, &mut state);
}

fn draw_municipality_view(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let [map_area, side_area] = split_map(area);
    let data = &app.data;
    let kpi = app.kpi;

    let scale = Scale::spanning(
        data.features
            .iter()
            .filter_map(|feature| kpi.value(&feature.metric)),
    );
    let colours: Vec<Color> = data
        .features
        .iter()
        .map(|feature| match (kpi.value(&feature.metric), scale) {
            (Some(value), Some(scale)) => colour(Ramp::Blues.at(scale.fraction(value))),
            _ => Color::DarkGray,
        })
        .collect();

    let mut fills: Vec<Vec<(f64, f64)>> = vec![Vec::new(); data.features.len()];
    for cell in &data.raster {
        if let Some(points) = fills.get_mut(cell.feature) {
            points.push((cell.lon, cell.lat));
        }
    }
    let selected = app.selected_feature().map(|(idx, _)| idx);

    let title = match scale {
        Some(scale) => format!(
            "{} (min {} · max {})",
            kpi.label(),
            kpi.display(Some(scale.min)),
            kpi.display(Some(scale.max))
        ),
        None => format!("{} (no data)", kpi.label()),
    };

    let map = map_canvas(app, title, |ctx| {
        for (points, colour) in fills.iter().zip(&colours) {
            ctx.draw(&Points {
                coords: points,
                color: *colour,
            });
        }
        ctx.layer();
        for (idx, rings) in data.outlines.iter().enumerate() {
            if Some(idx) != selected {
                draw_rings(ctx, rings, Color::Gray);
            }
        }
        if let Some(rings) = selected.and_then(|idx| data.outlines.get(idx)) {
            draw_rings(ctx, rings, Color::Yellow);
        }
    });
    frame.render_widget(map, map_area);

    let side_chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([Constraint::Min(5), Constraint::Length(details_height(app))])
        .split(side_area);
    let [ranking_area, details_area] = side_chunks.as_ref() else {
        return;
    };

    draw_ranking(frame, app, *ranking_area);
    draw_details(frame, app, *details_area);
}

fn draw_ranking(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let kpi = app.kpi;
    let rows = app
        .ranking()
        .into_iter()
        .enumerate()
        .filter_map(|(rank, idx)| {
            let feature = app.data.features.get(idx)?;
            Some(Row::new(vec![
                Cell::from((rank + 1).to_string()),
                Cell::from(feature.metric.name_de.clone()),
                Cell::from(kpi.display(kpi.value(&feature.metric))),
            ]))
        });

    let table = Table::new(
        rows,
        [
            Constraint::Length(4),
            Constraint::Min(12),
            Constraint::Length(14),
        ],
    )
    .header(
        Row::new(vec!["#", "Municipality", "Value"])
            .style(Style::default().add_modifier(Modifier::BOLD)),
    )
    .block(Block::default().borders(Borders::ALL).title("Ranking"))
    .row_highlight_style(
        Style::default()
            .fg(Color::Yellow)
            .add_modifier(Modifier::BOLD),
    )
    .column_spacing(1);

    let mut state = TableState::default();
    if !app.data.features.is_empty() {
        state.select(Some(app.ranking_index));
    }
    frame.render_stateful_widget(table, area, &mut state);
}

fn details_height(app: &App) -> u16 {
    let kpi_lines = if app.show_all_kpis { Kpi::ALL.len() } else { 1 };
    u16::try_from(kpi_lines + 4).unwrap_or(u16::MAX)
}

fn details_lines(app: &App) -> Vec<Line<'static>> {
    let Some((_, feature)) = app.selected_feature() else {
        return vec![Line::from("No municipality selected")];
    };
    let metric = &feature.metric;

    let mut lines = vec![
        Line::from(Span::styled(
            format!("{} / {}", metric.name_de, metric.name_it),
            Style::default().add_modifier(Modifier::BOLD),
        )),
        Line::from(format!("Population: {}", metric.population)),
    ];

    let shown: Vec<Kpi> = if app.show_all_kpis {
        Kpi::ALL.to_vec()
    } else {
        vec![app.kpi]
    };
    lines.extend(shown.into_iter().map(|kpi| {
        let style = if kpi == app.kpi {
            Style::default().fg(Color::Yellow)
        } else {
            Style::default()
        };
        Line::from(vec![
            Span::raw(format!("{}: ", kpi.label())),
            Span::styled(kpi.display(kpi.value(metric)), style),
        ])
    }));
    lines
}

fn draw_details(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let details = Paragraph::new(details_lines(app))
        .block(Block::default().borders(Borders::ALL).title("Details (t toggles all KPIs)"))
        .wrap(Wrap { trim: true });
    frame.render_widget(details, area);
}

fn draw_gps_view(frame: &mut Frame<'_>, app: &App, area: Rect) {
    let [map_area, side_area] = split_map(area);
    let data = &app.data;

    let Some(grid) = data.grid.as_ref() else {
        let paragraph = Paragraph::new("No density grid found, run prepare-data first.")
            .block(Block::default().borders(Borders::ALL).title("Density"))
            .wrap(Wrap { trim: true });
        frame.render_widget(paragraph, area);
        return;
    };

    let max = grid.max_value().filter(|max| *max > 0.0);
    let mut buckets: Vec<Vec<(f64, f64)>> = vec![Vec::new(); DENSITY_BUCKETS as usize];
    if let Some(max) = max {
        for row in 0..grid.rows {
            for col in 0..grid.cols {
                let Some(value) = grid.value(row, col).filter(|value| *value > 0.0) else {
                    continue;
                };
                if let Some(bucket) = buckets.get_mut(bucket_of(value / max)) {
                    bucket.push(grid.node(row, col));
                }
            }
        }
    }
    let bucket_colours: Vec<Color> = (0..DENSITY_BUCKETS)
        .map(|bucket| colour(Ramp::PuBu.at(f64::from(bucket + 1) / f64::from(DENSITY_BUCKETS))))
        .collect();

    let title = format!("Density of Tourism Establishments (bandwidth {}°)", grid.bandwidth);
    let map = map_canvas(app, title, |ctx| {
        for (points, colour) in buckets.iter().zip(&bucket_colours) {
            ctx.draw(&Points {
                coords: points,
                color: *colour,
            });
        }
        ctx.layer();
        for rings in &data.outlines {
            draw_rings(ctx, rings, Color::DarkGray);
        }
        if app.show_establishments {
            ctx.layer();
            ctx.draw(&Points {
                coords: &data.establishments,
                color: Color::White,
            });
        }
        ctx.layer();
        for town in &REFERENCE_TOWNS {
            ctx.print(
                town.longitude,
                town.latitude,
                Span::styled(format!("● {}", town.name), Style::default().fg(Color::Red)),
            );
        }
    });
    frame.render_widget(map, map_area);

    let mut lines = vec![
        Line::from(format!("Grid: {} × {}", grid.rows, grid.cols)),
        Line::from(format!("Bandwidth: {}°", grid.bandwidth)),
        Line::from(format!(
            "Peak density: {}",
            max.map_or_else(|| "n/a".to_owned(), |max| format!("{max:.2}"))
        )),
        Line::from(format!("Establishments: {}", data.establishments.len())),
        Line::from(""),
    ];
    lines.extend(
        bucket_colours
            .iter()
            .enumerate()
            .map(|(bucket, colour)| {
                Line::from(vec![
                    Span::styled("■ ", Style::default().fg(*colour)),
                    Span::raw(format!(
                        "{}–{}% of peak",
                        bucket * 20,
                        (bucket + 1) * 20
                    )),
                ])
            }),
    );
    let legend = Paragraph::new(lines)
        .block(Block::default().borders(Borders::ALL).title("Legend"))
        .wrap(Wrap { trim: true });
    frame.render_widget(legend, side_area);
}

fn split_map(area: Rect) -> [Rect; 2] {
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([Constraint::Percentage(62), Constraint::Percentage(38)])
        .split(area);
    match chunks.as_ref() {
        [map, side] => [*map, *side],
        _ => [area, Rect::default()],
    }
}

fn map_canvas<F>(app: &App, title: String, painter: F) -> Canvas<'static, F>
where
    F: Fn(&mut Context<'_>),
{
    let bounds = app.data.bounds;
    Canvas::default()
        .block(Block::default().borders(Borders::ALL).title(title))
        .marker(Marker::Braille)
        .x_bounds([bounds.min().x, bounds.max().x])
        .y_bounds([bounds.min().y, bounds.max().y])
        .paint(painter)
}

fn draw_rings(ctx: &mut Context<'_>, rings: &[Vec<(f64, f64)>], color: Color) {
    for ring in rings {
        for segment in ring.windows(2) {
            let [(x1, y1), (x2, y2)] = segment else {
                continue;
            };
            ctx.draw(&CanvasLine::new(*x1, *y1, *x2, *y2, color));
        }
    }
}

#[expect(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    reason = "fraction is clamped to [0, 1]"
)]
fn bucket_of(fraction: f64) -> usize {
    let scaled = (fraction.clamp(0.0, 1.0) * f64::from(DENSITY_BUCKETS)).floor() as usize;
    scaled.min(DENSITY_BUCKETS as usize - 1)
}

fn colour(rgb: Rgb) -> Color {
    Color::Rgb(rgb.0, rgb.1, rgb.2)
}
