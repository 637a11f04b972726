use eframe::egui::Ui;
use egui_plot::{Bar, BarChart, Legend, Line, Plot, PlotPoints};

use crate::color::ColorMap;

const CHART_HEIGHT: f32 = 280.0;

// ---------------------------------------------------------------------------
// Line chart: one series per label
// ---------------------------------------------------------------------------

/// Render one line per `(label, points)` series.
pub fn line_chart(ui: &mut Ui, id: &str, x_label: &str, y_label: &str, series: &[(String, Vec<[f64; 2]>)]) {
    let colors = ColorMap::new(series.iter().map(|(name, _)| name.clone()));

    Plot::new(id)
        .legend(Legend::default())
        .x_axis_label(x_label)
        .y_axis_label(y_label)
        .height(CHART_HEIGHT)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            for (name, points) in series {
                let line = Line::new(PlotPoints::from(points.clone()))
                    .name(name)
                    .color(colors.color_for(name))
                    .width(1.5);
                plot_ui.line(line);
            }
        });
}

// ---------------------------------------------------------------------------
// Bar charts
// ---------------------------------------------------------------------------

/// One bar per `(label, value)`; each bar is its own legend entry.
pub fn bar_chart(ui: &mut Ui, id: &str, x_label: &str, y_label: &str, bars: &[(String, f64)], horizontal: bool) {
    let colors = ColorMap::new(bars.iter().map(|(name, _)| name.clone()));

    Plot::new(id)
        .legend(Legend::default())
        .x_axis_label(x_label)
        .y_axis_label(y_label)
        .height(CHART_HEIGHT)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            for (i, (name, value)) in bars.iter().enumerate() {
                let mut chart = BarChart::new(vec![Bar::new(i as f64, *value).width(0.7).name(name)])
                    .name(name)
                    .color(colors.color_for(name));
                if horizontal {
                    chart = chart.horizontal();
                }
                plot_ui.bar_chart(chart);
            }
        });
}

/// Grouped bars: `groups` along the axis, one coloured bar per series in
/// each group. `values[series][group]`.
pub fn grouped_bar_chart(
    ui: &mut Ui,
    id: &str,
    y_label: &str,
    groups: &[String],
    series: &[String],
    values: &[Vec<f64>],
) {
    let colors = ColorMap::new(series.iter().cloned());
    let width = 0.8 / series.len().max(1) as f64;

    ui.label(
        groups
            .iter()
            .enumerate()
            .map(|(i, g)| format!("{i} = {g}"))
            .collect::<Vec<_>>()
            .join("   "),
    );
    Plot::new(id)
        .legend(Legend::default())
        .y_axis_label(y_label)
        .height(CHART_HEIGHT)
        .allow_scroll(false)
        .show(ui, |plot_ui| {
            for (s, (name, row)) in series.iter().zip(values).enumerate() {
                let bars = row
                    .iter()
                    .enumerate()
                    .map(|(g, v)| {
                        let x = g as f64 - 0.4 + width * (s as f64 + 0.5);
                        Bar::new(x, *v).width(width).name(&groups[g])
                    })
                    .collect();
                plot_ui.bar_chart(BarChart::new(bars).name(name).color(colors.color_for(name)));
            }
        });
}
