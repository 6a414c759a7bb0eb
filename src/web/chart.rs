use chrono::NaiveDate;
use std::fmt::Write;

use crate::util::format::with_thousands;

const WIDTH: f64 = 720.0;
const HEIGHT: f64 = 280.0;
const PAD_LEFT: f64 = 64.0;
const PAD_RIGHT: f64 = 12.0;
const PAD_Y: f64 = 20.0;

/// Renders a closing-price series as an inline SVG line chart.
///
/// Returns `None` for an empty series so callers render no chart at all.
pub fn line_chart_svg(points: &[(NaiveDate, f64)]) -> Option<String> {
    let (first, last) = (points.first()?, points.last()?);

    let (min, max) = points
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(_, v)| (lo.min(v), hi.max(v)));
    // Flat series still need a non-zero span
    let span = if max > min { max - min } else { 1.0 };

    let plot_w = WIDTH - PAD_LEFT - PAD_RIGHT;
    let plot_h = HEIGHT - 2.0 * PAD_Y;
    let step = if points.len() > 1 {
        plot_w / (points.len() - 1) as f64
    } else {
        0.0
    };

    let mut polyline = String::new();
    for (i, &(_, value)) in points.iter().enumerate() {
        let x = PAD_LEFT + step * i as f64;
        let y = PAD_Y + (max - value) / span * plot_h;
        if i > 0 {
            polyline.push(' ');
        }
        let _ = write!(polyline, "{:.1},{:.1}", x, y);
    }

    let mut svg = String::new();
    let _ = write!(
        svg,
        r#"<svg class="chart" viewBox="0 0 {w} {h}" xmlns="http://www.w3.org/2000/svg" role="img" aria-label="Closing prices">"#,
        w = WIDTH,
        h = HEIGHT
    );
    let _ = write!(
        svg,
        r#"<line class="axis" x1="{x}" y1="{top}" x2="{x}" y2="{bottom}"/><line class="axis" x1="{x}" y1="{bottom}" x2="{right}" y2="{bottom}"/>"#,
        x = PAD_LEFT,
        top = PAD_Y,
        bottom = HEIGHT - PAD_Y,
        right = WIDTH - PAD_RIGHT
    );
    let _ = write!(
        svg,
        r#"<text class="label" x="{lx}" y="{ty}" text-anchor="end">{max}</text><text class="label" x="{lx}" y="{by}" text-anchor="end">{min}</text>"#,
        lx = PAD_LEFT - 6.0,
        ty = PAD_Y + 4.0,
        by = HEIGHT - PAD_Y,
        max = with_thousands(max, 0),
        min = with_thousands(min, 0)
    );
    let _ = write!(
        svg,
        r#"<text class="label" x="{x0}" y="{y}" text-anchor="start">{d0}</text><text class="label" x="{x1}" y="{y}" text-anchor="end">{d1}</text>"#,
        x0 = PAD_LEFT,
        x1 = WIDTH - PAD_RIGHT,
        y = HEIGHT - 4.0,
        d0 = first.0,
        d1 = last.0
    );
    let _ = write!(svg, r#"<polyline class="series" fill="none" points="{}"/></svg>"#, polyline);

    Some(svg)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn empty_series_has_no_chart() {
        assert_eq!(line_chart_svg(&[]), None);
    }

    #[test]
    fn one_vertex_per_point() {
        let points: Vec<_> = (1..=10).map(|d| (day(d), 100.0 + d as f64)).collect();
        let svg = line_chart_svg(&points).unwrap();
        let series = svg.split("points=\"").nth(1).unwrap().split('"').next().unwrap();
        assert_eq!(series.split(' ').count(), 10);
        assert!(svg.contains("2024-06-01"));
        assert!(svg.contains("2024-06-10"));
        assert!(!svg.contains("NaN"));
    }

    #[test]
    fn flat_and_single_point_series_render() {
        let flat = line_chart_svg(&[(day(1), 5.0), (day(2), 5.0)]).unwrap();
        assert!(!flat.contains("NaN") && !flat.contains("inf"));

        let single = line_chart_svg(&[(day(1), 5.0)]).unwrap();
        assert!(single.contains("<polyline"));
    }
}
