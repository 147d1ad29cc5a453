use egui::epaint::TextShape;
use egui::{Align2, Color32, FontId, Pos2, Rect, Sense, Vec2};
use egui_plot::{Bar, BarChart, BoxElem, BoxPlot, BoxSpread, HPlacement, Legend, Line, Plot};

use crate::pivot::PivotTable;
use crate::stats::{CorrelationMatrix, FiveNumber};

/// Categorical palette cycled over stations
const STATION_COLORS: &[Color32] = &[
    Color32::from_rgb(0x63, 0x6e, 0xfa),
    Color32::from_rgb(0xef, 0x55, 0x3b),
    Color32::from_rgb(0x00, 0xcc, 0x96),
    Color32::from_rgb(0xab, 0x63, 0xfa),
    Color32::from_rgb(0xff, 0xa1, 0x5a),
    Color32::from_rgb(0x19, 0xd3, 0xf3),
    Color32::from_rgb(0xff, 0x66, 0x92),
    Color32::from_rgb(0xb6, 0xe8, 0x80),
    Color32::from_rgb(0xff, 0x97, 0xff),
    Color32::from_rgb(0xfe, 0xcb, 0x52),
    Color32::from_rgb(0x1f, 0x77, 0xb4),
    Color32::from_rgb(0x8c, 0x56, 0x4b),
];

pub fn station_color(index: usize) -> Color32 {
    STATION_COLORS[index % STATION_COLORS.len()]
}

/// Sequential colormap for count heatmaps, 0..=1
fn count_color(t: f64) -> Color32 {
    let c = colorous::YELLOW_GREEN_BLUE.eval_continuous(t.clamp(0.0, 1.0));
    Color32::from_rgb(c.r, c.g, c.b)
}

/// Diverging colormap for correlation cells, reversed so +1 reads warm
fn correlation_color(r: f64) -> Color32 {
    let t = (r.clamp(-1.0, 1.0) + 1.0) / 2.0;
    let c = colorous::RED_YELLOW_BLUE.eval_continuous(1.0 - t);
    Color32::from_rgb(c.r, c.g, c.b)
}

/// Annotation color with enough contrast against the cell fill
fn annotation_color(t: f64) -> Color32 {
    if t > 0.55 {
        Color32::WHITE
    } else {
        Color32::from_gray(40)
    }
}

const CELL_FONT: f32 = 10.0;
const LABEL_FONT: f32 = 11.0;

/// Paint a station-by-category count heatmap with annotated cells, rotated
/// column labels, a hover tooltip per cell, and a gradient scale.
pub fn count_heatmap(ui: &mut egui::Ui, id_salt: &str, pivot: &PivotTable) {
    if pivot.is_empty() {
        ui.label("No category combination reaches the display threshold.");
        return;
    }

    let max = pivot.max_value().max(1) as f64;
    ui.horizontal_top(|ui| {
        let grid_height = count_grid(ui, id_salt, pivot, max);
        colorbar(ui, id_salt, 0.0, max, grid_height, |v| count_color(v / max));
    });
}

fn count_grid(ui: &mut egui::Ui, id_salt: &str, pivot: &PivotTable, max: f64) -> f32 {
    let cell = Vec2::new(34.0, 24.0);
    let label_font = FontId::proportional(LABEL_FONT);
    let text_color = ui.visuals().text_color();

    let row_galleys: Vec<_> = pivot
        .index
        .iter()
        .map(|s| ui.painter().layout_no_wrap(s.clone(), label_font.clone(), text_color))
        .collect();
    let col_galleys: Vec<_> = (0..pivot.columns.len())
        .map(|c| {
            ui.painter()
                .layout_no_wrap(pivot.column_label(c), label_font.clone(), text_color)
        })
        .collect();

    let row_label_width = row_galleys.iter().map(|g| g.size().x).fold(0.0f32, f32::max) + 12.0;
    // Column labels are rotated upright, so their width becomes header height
    let header_height = col_galleys.iter().map(|g| g.size().x).fold(0.0f32, f32::max) + 8.0;

    let rows = pivot.index.len();
    let cols = pivot.columns.len();
    let desired = Vec2::new(
        row_label_width + cell.x * cols as f32,
        header_height + cell.y * rows as f32,
    );
    let (rect, response) = ui.allocate_exact_size(desired, Sense::hover());
    if !ui.is_rect_visible(rect) {
        return desired.y;
    }

    let painter = ui.painter();
    let origin = rect.min + Vec2::new(row_label_width, header_height);

    for (c, galley) in col_galleys.into_iter().enumerate() {
        let pos = Pos2::new(
            origin.x + cell.x * c as f32 + (cell.x - galley.size().y) / 2.0,
            origin.y - 4.0,
        );
        painter.add(TextShape::new(pos, galley, text_color).with_angle(-std::f32::consts::FRAC_PI_2));
    }
    for (r, galley) in row_galleys.into_iter().enumerate() {
        let pos = Pos2::new(
            rect.min.x + row_label_width - galley.size().x - 8.0,
            origin.y + cell.y * r as f32 + (cell.y - galley.size().y) / 2.0,
        );
        painter.galley(pos, galley, text_color);
    }

    for r in 0..rows {
        for c in 0..cols {
            let value = pivot.values[r][c];
            let t = value as f64 / max;
            let cell_rect = Rect::from_min_size(
                origin + Vec2::new(cell.x * c as f32, cell.y * r as f32),
                cell,
            );
            painter.rect_filled(cell_rect.shrink(0.5), 0.0, count_color(t));
            painter.text(
                cell_rect.center(),
                Align2::CENTER_CENTER,
                value.to_string(),
                FontId::proportional(CELL_FONT),
                annotation_color(t),
            );
        }
    }

    if let Some(pos) = response.hover_pos() {
        if pos.x >= origin.x && pos.y >= origin.y {
            let c = ((pos.x - origin.x) / cell.x) as usize;
            let r = ((pos.y - origin.y) / cell.y) as usize;
            if r < rows && c < cols {
                egui::show_tooltip_at_pointer(ui.ctx(), egui::Id::new((id_salt, "cell")), |ui| {
                    ui.strong(&pivot.index[r]);
                    ui.label(pivot.column_label(c));
                    ui.label(format!("count: {}", pivot.values[r][c]));
                });
            }
        }
    }

    desired.y
}

/// Paint an annotated correlation heatmap with a gradient scale.
/// Undefined cells stay blank.
pub fn correlation_heatmap(ui: &mut egui::Ui, id_salt: &str, matrix: &CorrelationMatrix) {
    if matrix.is_empty() {
        ui.label("No numeric columns to correlate.");
        return;
    }

    ui.horizontal_top(|ui| {
        let grid_height = correlation_grid(ui, id_salt, matrix);
        colorbar(ui, id_salt, -1.0, 1.0, grid_height, correlation_color);
    });
}

fn correlation_grid(ui: &mut egui::Ui, id_salt: &str, matrix: &CorrelationMatrix) -> f32 {
    let cell = Vec2::new(44.0, 28.0);
    let label_font = FontId::proportional(LABEL_FONT);
    let text_color = ui.visuals().text_color();

    let galleys: Vec<_> = matrix
        .fields
        .iter()
        .map(|f| ui.painter().layout_no_wrap(f.clone(), label_font.clone(), text_color))
        .collect();
    let row_label_width = galleys.iter().map(|g| g.size().x).fold(0.0f32, f32::max) + 12.0;
    let header_height = galleys.iter().map(|g| g.size().x).fold(0.0f32, f32::max) + 8.0;

    let n = matrix.fields.len();
    let desired = Vec2::new(
        row_label_width + cell.x * n as f32,
        header_height + cell.y * n as f32,
    );
    let (rect, response) = ui.allocate_exact_size(desired, Sense::hover());
    if !ui.is_rect_visible(rect) {
        return desired.y;
    }

    let painter = ui.painter();
    let origin = rect.min + Vec2::new(row_label_width, header_height);

    for (i, galley) in galleys.iter().enumerate() {
        // Column label, rotated upright
        let col_pos = Pos2::new(
            origin.x + cell.x * i as f32 + (cell.x - galley.size().y) / 2.0,
            origin.y - 4.0,
        );
        painter.add(
            TextShape::new(col_pos, galley.clone(), text_color)
                .with_angle(-std::f32::consts::FRAC_PI_2),
        );
        // Row label
        let row_pos = Pos2::new(
            rect.min.x + row_label_width - galley.size().x - 8.0,
            origin.y + cell.y * i as f32 + (cell.y - galley.size().y) / 2.0,
        );
        painter.galley(row_pos, galley.clone(), text_color);
    }

    for i in 0..n {
        for j in 0..n {
            let cell_rect = Rect::from_min_size(
                origin + Vec2::new(cell.x * j as f32, cell.y * i as f32),
                cell,
            );
            match matrix.values[i][j] {
                Some(r) => {
                    painter.rect_filled(cell_rect.shrink(0.5), 0.0, correlation_color(r));
                    let toward_edge = r.abs();
                    painter.text(
                        cell_rect.center(),
                        Align2::CENTER_CENTER,
                        format!("{r:.2}"),
                        FontId::proportional(CELL_FONT),
                        annotation_color(toward_edge),
                    );
                }
                None => {
                    painter.rect_filled(
                        cell_rect.shrink(0.5),
                        0.0,
                        ui.visuals().faint_bg_color,
                    );
                }
            }
        }
    }

    if let Some(pos) = response.hover_pos() {
        if pos.x >= origin.x && pos.y >= origin.y {
            let j = ((pos.x - origin.x) / cell.x) as usize;
            let i = ((pos.y - origin.y) / cell.y) as usize;
            if i < n && j < n {
                egui::show_tooltip_at_pointer(ui.ctx(), egui::Id::new((id_salt, "cell")), |ui| {
                    ui.strong(format!("{} / {}", matrix.fields[i], matrix.fields[j]));
                    match matrix.values[i][j] {
                        Some(r) => ui.label(format!("r = {r:.3}")),
                        None => ui.label("undefined"),
                    };
                });
            }
        }
    }

    desired.y
}

/// Vertical gradient scale for a heatmap: stacked colored line segments in a
/// narrow plot, value axis on the right
fn colorbar(
    ui: &mut egui::Ui,
    id_salt: &str,
    min_val: f64,
    max_val: f64,
    height: f32,
    color_at: impl Fn(f64) -> Color32,
) {
    const STEPS: usize = 50;
    let mut lines = Vec::with_capacity(STEPS);
    for i in 0..STEPS {
        let t1 = i as f64 / STEPS as f64;
        let t2 = (i + 1) as f64 / STEPS as f64;
        let v1 = min_val + t1 * (max_val - min_val);
        let v2 = min_val + t2 * (max_val - min_val);
        lines.push(
            Line::new(vec![[0.0, v1], [0.0, v2]])
                .color(color_at(v1))
                .width(10.0),
        );
    }

    Plot::new((id_salt, "colorbar"))
        .width(70.0)
        .height(height)
        .y_axis_position(HPlacement::Right)
        .show_x(false)
        .allow_drag(false)
        .allow_zoom(false)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            for line in lines {
                plot_ui.line(line);
            }
        });
}

/// Per-station mean bar chart, one colored series per station
pub fn station_means_chart(
    ui: &mut egui::Ui,
    id_salt: &str,
    stations: &[String],
    means: &[Option<f64>],
    field: &str,
) {
    let mut charts = Vec::new();
    for (i, (station, mean)) in stations.iter().zip(means).enumerate() {
        if let Some(mean) = mean {
            let bar = Bar::new(i as f64, *mean).width(0.7);
            charts.push(
                BarChart::new(vec![bar])
                    .name(station)
                    .color(station_color(i)),
            );
        }
    }

    Plot::new((id_salt, field))
        .legend(Legend::default())
        .height(280.0)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            for chart in charts {
                plot_ui.bar_chart(chart);
            }
        });
}

/// Per-station box plot from five-number summaries
pub fn station_box_chart(
    ui: &mut egui::Ui,
    id_salt: &str,
    stations: &[String],
    spreads: &[Option<FiveNumber>],
    field: &str,
) {
    let mut plots = Vec::new();
    for (i, (station, spread)) in stations.iter().zip(spreads).enumerate() {
        if let Some(f) = spread {
            let elem = BoxElem::new(
                i as f64,
                BoxSpread::new(f.min, f.q1, f.median, f.q3, f.max),
            )
            .box_width(0.6)
            .whisker_width(0.4);
            plots.push(
                BoxPlot::new(vec![elem])
                    .name(station)
                    .color(station_color(i)),
            );
        }
    }

    Plot::new((id_salt, field))
        .legend(Legend::default())
        .height(280.0)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            for plot in plots {
                plot_ui.box_plot(plot);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_station_colors_cycle() {
        assert_eq!(station_color(0), station_color(STATION_COLORS.len()));
        assert_ne!(station_color(0), station_color(1));
    }

    #[test]
    fn test_count_color_endpoints_differ() {
        assert_ne!(count_color(0.0), count_color(1.0));
        // Out-of-range values clamp instead of panicking
        assert_eq!(count_color(-1.0), count_color(0.0));
        assert_eq!(count_color(2.0), count_color(1.0));
    }

    #[test]
    fn test_correlation_color_is_diverging() {
        assert_ne!(correlation_color(-1.0), correlation_color(1.0));
        assert_ne!(correlation_color(0.0), correlation_color(1.0));
    }
}
