use image::ImageEncoder;
use plotters::coord::Shift;
use plotters::prelude::*;
use thiserror::Error;

use super::aggregate::ChartSpec;

pub const GRID_COLUMNS: usize = 3;
pub const DEFAULT_SIZE: (u32, u32) = (1280, 960);

const CAPTION_FONT: (&str, u32) = ("sans-serif", 16);
const LABEL_FONT: (&str, u32) = ("sans-serif", 10);
const LEGEND_FONT: (&str, u32) = ("sans-serif", 14);
const TRACE_WIDTH: u32 = 2;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("chart drawing failed: {0}")]
    Draw(String),
    #[error("png encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

/// Subplot grid height for a given eligible-channel count. The extra cell
/// beyond the channel subplots holds the shared legend panel.
pub fn grid_rows(subplot_count: usize) -> usize {
    (subplot_count + 1).div_ceil(GRID_COLUMNS)
}

/// Encode the chart as a PNG, drawn into an in-memory RGB buffer.
pub fn render_png(chart: &ChartSpec, size: (u32, u32)) -> Result<Vec<u8>, RenderError> {
    let (width, height) = size;
    let mut buffer = vec![0u8; width as usize * height as usize * 3];
    {
        let root = BitMapBackend::with_buffer(&mut buffer, size).into_drawing_area();
        draw(chart, &root)?;
        root.present().map_err(|e| RenderError::Draw(e.to_string()))?;
    }
    let mut png = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png).write_image(
        &buffer,
        width,
        height,
        image::ExtendedColorType::Rgb8,
    )?;
    Ok(png)
}

/// Encode the chart as a standalone SVG document, embeddable inline in a
/// page without any external script or style references.
pub fn render_svg(chart: &ChartSpec, size: (u32, u32)) -> Result<String, RenderError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, size).into_drawing_area();
        draw(chart, &root)?;
        root.present().map_err(|e| RenderError::Draw(e.to_string()))?;
    }
    Ok(svg)
}

/// Shared drawing routine: both encoders consume the same `ChartSpec`, so
/// static and interactive output always agree on structure.
fn draw<DB: DrawingBackend>(
    chart: &ChartSpec,
    root: &DrawingArea<DB, Shift>,
) -> Result<(), RenderError> {
    root.fill(&WHITE)
        .map_err(|e| RenderError::Draw(e.to_string()))?;

    if chart.is_empty() {
        return draw_placeholder(root);
    }

    let rows = grid_rows(chart.subplots.len());
    let areas = root.split_evenly((rows, GRID_COLUMNS));
    for (subplot, area) in chart.subplots.iter().zip(&areas) {
        draw_subplot(subplot, area)?;
    }
    draw_legend(chart, &areas[chart.subplots.len()])
}

fn draw_subplot<DB: DrawingBackend>(
    subplot: &super::aggregate::SubplotSpec,
    area: &DrawingArea<DB, Shift>,
) -> Result<(), RenderError> {
    let (x_range, y_range) = data_ranges(subplot);
    let mut chart = ChartBuilder::on(area)
        .caption(&subplot.title, CAPTION_FONT.into_font())
        .margin(8)
        .set_label_area_size(LabelAreaPosition::Left, 45)
        .set_label_area_size(LabelAreaPosition::Bottom, 30)
        .build_cartesian_2d(x_range, y_range)
        .map_err(|e| RenderError::Draw(e.to_string()))?;

    // Tick labels stay horizontal: plotters only rotates text in 90 degree
    // steps, and elapsed-seconds labels are short enough not to collide.
    chart
        .configure_mesh()
        .x_desc("Time (s)")
        .label_style(LABEL_FONT.into_font())
        .draw()
        .map_err(|e| RenderError::Draw(e.to_string()))?;

    for (group_idx, trace) in subplot.traces.iter().enumerate() {
        let style = ShapeStyle::from(&Palette99::pick(group_idx)).stroke_width(TRACE_WIDTH);
        chart
            .draw_series(LineSeries::new(trace.points.iter().copied(), style))
            .map_err(|e| RenderError::Draw(e.to_string()))?;
    }
    Ok(())
}

/// Legend panel in the slack grid cell: one color swatch and origin
/// timestamp per group.
fn draw_legend<DB: DrawingBackend>(
    chart: &ChartSpec,
    area: &DrawingArea<DB, Shift>,
) -> Result<(), RenderError> {
    for (group_idx, label) in chart.group_labels().iter().enumerate() {
        let y = 24 + group_idx as i32 * 20;
        let style = ShapeStyle::from(&Palette99::pick(group_idx)).stroke_width(TRACE_WIDTH);
        area.draw(&PathElement::new(vec![(12, y), (44, y)], style))
            .map_err(|e| RenderError::Draw(e.to_string()))?;
        area.draw(&Text::new(label.to_string(), (52, y - 7), LEGEND_FONT.into_font()))
            .map_err(|e| RenderError::Draw(e.to_string()))?;
    }
    Ok(())
}

/// Empty table or zero eligible channels: a framed blank figure instead of
/// an error.
fn draw_placeholder<DB: DrawingBackend>(root: &DrawingArea<DB, Shift>) -> Result<(), RenderError> {
    let (width, height) = root.dim_in_pixel();
    root.draw(&Rectangle::new(
        [(4, 4), (width as i32 - 5, height as i32 - 5)],
        BLACK.stroke_width(1),
    ))
    .map_err(|e| RenderError::Draw(e.to_string()))
}

fn data_ranges(
    subplot: &super::aggregate::SubplotSpec,
) -> (std::ops::Range<f64>, std::ops::Range<f64>) {
    let mut x_min = f64::INFINITY;
    let mut x_max = f64::NEG_INFINITY;
    let mut y_min = f64::INFINITY;
    let mut y_max = f64::NEG_INFINITY;
    for point in subplot.traces.iter().flat_map(|t| &t.points) {
        x_min = x_min.min(point.0);
        x_max = x_max.max(point.0);
        y_min = y_min.min(point.1);
        y_max = y_max.max(point.1);
    }
    // Single-point groups and constant channels need a non-degenerate span.
    if !x_min.is_finite() {
        x_min = 0.0;
        x_max = 1.0;
    } else if x_min == x_max {
        x_max = x_min + 1.0;
    }
    if !y_min.is_finite() {
        y_min = 0.0;
        y_max = 1.0;
    } else if y_min == y_max {
        y_min -= 1.0;
        y_max += 1.0;
    }
    (x_min..x_max, y_min..y_max)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plot::aggregate::{SubplotSpec, TraceSpec};

    #[test]
    fn grid_keeps_three_columns_and_a_slack_cell() {
        assert_eq!(grid_rows(1), 1);
        assert_eq!(grid_rows(2), 1);
        assert_eq!(grid_rows(3), 2);
        assert_eq!(grid_rows(5), 2);
        assert_eq!(grid_rows(8), 3);
        // A full last row still gets a cell for the legend.
        assert_eq!(grid_rows(9), 4);
    }

    #[test]
    fn empty_chart_renders_a_placeholder_not_an_error() {
        let empty = ChartSpec { subplots: vec![] };
        let png = render_png(&empty, (320, 240)).unwrap();
        // PNG magic bytes.
        assert_eq!(&png[..8], &[0x89, b'P', b'N', b'G', b'\r', b'\n', 0x1a, b'\n']);

        let svg = render_svg(&empty, (320, 240)).unwrap();
        assert!(svg.contains("<svg"));
    }

    #[test]
    fn degenerate_ranges_are_widened() {
        let subplot = SubplotSpec {
            title: "power_w".into(),
            traces: vec![TraceSpec {
                label: "2024-03-01 10:00:00".into(),
                points: vec![(0.0, 150.0)],
            }],
        };
        let (x, y) = data_ranges(&subplot);
        assert!(x.end > x.start);
        assert!(y.end > y.start);
        assert!(y.start < 150.0 && y.end > 149.0);
    }
}
