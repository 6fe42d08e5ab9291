//! Static SVG charts for an explained prediction.

use crate::core::shap::{global_importance, Attribution, Contribution};
use crate::utils::error::{Result, ScorerError};
use plotters::coord::ranged1d::SegmentedCoord;
use plotters::coord::types::RangedCoordi32;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use serde::{Deserialize, Serialize};
use std::ops::Range;
use std::path::{Path, PathBuf};

/// Pushes the output towards churn.
const POSITIVE: RGBColor = RGBColor(255, 0, 82);
/// Pushes the output away from churn.
const NEGATIVE: RGBColor = RGBColor(0, 139, 251);
const GUIDE: RGBColor = RGBColor(110, 110, 110);

const FONT: &str = "sans-serif";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartSize {
    pub width: u32,
    pub height: u32,
}

impl Default for ChartSize {
    fn default() -> Self {
        Self {
            width: 800,
            height: 500,
        }
    }
}

/// Where the two charts of one run were written.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RenderedCharts {
    pub summary: PathBuf,
    pub contributions: PathBuf,
}

fn render_error<E: std::fmt::Display>(e: E) -> ScorerError {
    ScorerError::RenderError {
        message: e.to_string(),
    }
}

fn format_feature_value(value: f64) -> String {
    if value.fract() == 0.0 && value.abs() < 1e9 {
        format!("{}", value as i64)
    } else {
        format!("{:.2}", value)
    }
}

fn label_area_width<'a>(labels: impl Iterator<Item = &'a str>) -> u32 {
    let longest = labels.map(|label| label.chars().count()).max().unwrap_or(0) as u32;
    (longest * 7 + 16).clamp(80, 360)
}

/// Integer ranges are inclusive in plotters, so `rows` bars need `0..rows - 1`.
fn segments(rows: i32) -> SegmentedCoord<RangedCoordi32> {
    (0..(rows - 1).max(1)).into_segmented()
}

fn padded(min: f64, max: f64) -> Range<f64> {
    let span = (max - min).max(1e-3);
    let pad = span * 0.12;
    (min - pad)..(max + pad)
}

/// Horizontal bars of mean |SHAP| per feature, largest on top.
pub fn render_summary_chart(attributions: &[Attribution], path: &Path, size: ChartSize) -> Result<()> {
    let importance = global_importance(attributions);
    if importance.is_empty() {
        return Err(render_error("no attributions to summarise"));
    }

    let rows = importance.len() as i32;
    let max = importance.iter().map(|(_, v)| *v).fold(0.0, f64::max);
    let x_max = if max > 0.0 { max * 1.15 } else { 1.0 };

    // row 0 is drawn at the bottom, so the top row holds the largest impact
    let label_for = |segment: &SegmentValue<i32>| match segment {
        SegmentValue::CenterOf(y) if (0..rows).contains(y) => {
            importance[(rows - 1 - y) as usize].0.clone()
        }
        _ => String::new(),
    };

    let root = SVGBackend::new(path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE).map_err(render_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Overall Feature Impact", (FONT, 22))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(label_area_width(importance.iter().map(|(n, _)| n.as_str())))
        .build_cartesian_2d(0f64..x_max, segments(rows))
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(importance.len())
        .y_label_formatter(&label_for)
        .x_desc("mean(|SHAP value|) (average impact on model output)")
        .axis_desc_style((FONT, 14))
        .draw()
        .map_err(render_error)?;

    chart
        .draw_series(importance.iter().enumerate().map(|(rank, (_, value))| {
            let y = rows - 1 - rank as i32;
            let mut bar = Rectangle::new(
                [
                    (0.0, SegmentValue::Exact(y)),
                    (*value, SegmentValue::Exact(y + 1)),
                ],
                NEGATIVE.filled(),
            );
            bar.set_margin(4, 4, 0, 0);
            bar
        }))
        .map_err(render_error)?;

    root.present().map_err(render_error)?;
    tracing::debug!("Summary chart written to {}", path.display());
    Ok(())
}

/// Waterfall of one prediction: starts at the base value and adds each
/// feature's contribution until it reaches the model output.
pub fn render_contribution_chart(attribution: &Attribution, path: &Path, size: ChartSize) -> Result<()> {
    let ranked: Vec<Contribution> = attribution.ranked_contributions();
    if ranked.is_empty() {
        return Err(render_error("attribution has no features"));
    }

    let rows = ranked.len() as i32;
    // bars accumulate bottom-up: the least important feature starts at the base value
    let mut steps = Vec::with_capacity(ranked.len());
    let mut running = attribution.base_value;
    for (y, contribution) in ranked.iter().rev().enumerate() {
        let start = running;
        running += contribution.shap_value;
        steps.push((y as i32, start, running, contribution));
    }
    let output = running;

    let (lo, hi) = steps.iter().fold(
        (attribution.base_value, attribution.base_value),
        |(lo, hi), (_, start, end, _)| (lo.min(start.min(*end)), hi.max(start.max(*end))),
    );
    let x_range = padded(lo, hi);
    let nudge = (x_range.end - x_range.start) * 0.01;

    let labels: Vec<String> = ranked
        .iter()
        .rev()
        .map(|c| format!("{} = {}", c.feature, format_feature_value(c.value)))
        .collect();
    let label_for = |segment: &SegmentValue<i32>| match segment {
        SegmentValue::CenterOf(y) if (0..rows).contains(y) => labels[*y as usize].clone(),
        _ => String::new(),
    };

    let root = SVGBackend::new(path, (size.width, size.height)).into_drawing_area();
    root.fill(&WHITE).map_err(render_error)?;

    let mut chart = ChartBuilder::on(&root)
        .caption("Detailed Feature Contributions", (FONT, 22))
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(label_area_width(labels.iter().map(String::as_str)))
        .build_cartesian_2d(x_range, segments(rows))
        .map_err(render_error)?;

    chart
        .configure_mesh()
        .disable_y_mesh()
        .y_labels(ranked.len())
        .y_label_formatter(&label_for)
        .x_desc(format!(
            "base value {:.3} -> model output f(x) = {:.3} (log-odds)",
            attribution.base_value, output
        ))
        .axis_desc_style((FONT, 14))
        .draw()
        .map_err(render_error)?;

    for (value, dashed) in [(attribution.base_value, true), (output, false)] {
        let style = if dashed {
            GUIDE.stroke_width(1)
        } else {
            BLACK.stroke_width(2)
        };
        chart
            .draw_series(std::iter::once(PathElement::new(
                vec![
                    (value, SegmentValue::Exact(0)),
                    (value, SegmentValue::Exact(rows)),
                ],
                style,
            )))
            .map_err(render_error)?;
    }

    chart
        .draw_series(steps.iter().map(|(y, start, end, contribution)| {
            let color = if contribution.shap_value >= 0.0 {
                POSITIVE
            } else {
                NEGATIVE
            };
            let mut bar = Rectangle::new(
                [
                    (*start, SegmentValue::Exact(*y)),
                    (*end, SegmentValue::Exact(*y + 1)),
                ],
                color.filled(),
            );
            bar.set_margin(5, 5, 0, 0);
            bar
        }))
        .map_err(render_error)?;

    chart
        .draw_series(steps.iter().map(|(y, start, end, contribution)| {
            let (x, anchor) = if end >= start {
                (end.max(*start) + nudge, HPos::Left)
            } else {
                (end.min(*start) - nudge, HPos::Right)
            };
            Text::new(
                format!("{:+.3}", contribution.shap_value),
                (x, SegmentValue::CenterOf(*y)),
                TextStyle::from((FONT, 12).into_font()).pos(Pos::new(anchor, VPos::Center)),
            )
        }))
        .map_err(render_error)?;

    root.present().map_err(render_error)?;
    tracing::debug!("Contribution chart written to {}", path.display());
    Ok(())
}

/// Renders both charts for `attribution` into `output_dir`.
pub fn render_charts(
    attribution: &Attribution,
    output_dir: &Path,
    summary_file: &str,
    contributions_file: &str,
    size: ChartSize,
) -> Result<RenderedCharts> {
    std::fs::create_dir_all(output_dir)?;

    let summary = output_dir.join(summary_file);
    render_summary_chart(std::slice::from_ref(attribution), &summary, size)?;

    let contributions = output_dir.join(contributions_file);
    render_contribution_chart(attribution, &contributions, size)?;

    Ok(RenderedCharts {
        summary,
        contributions,
    })
}
