//! PNG line charts of long frames.

use std::path::{Path, PathBuf};

use chrono::Duration;
use itertools::Itertools;
use log::info;
use plotters::prelude::*;

use crate::error::{Error, Result};
use crate::sink::{LongFrame, Sink};

/// Draws one line per (entity, series) pair with dates on the x axis.
pub struct LineChartSink {
    path: PathBuf,
    caption: String,
    size: (u32, u32),
}

impl LineChartSink {
    pub fn new(path: &Path, caption: &str) -> Self {
        LineChartSink {
            path: path.to_path_buf(),
            caption: caption.to_string(),
            size: (1024, 768),
        }
    }

    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = (width, height);
        self
    }
}

fn chart_err<E: std::fmt::Display>(e: E) -> Error {
    Error::Chart(e.to_string())
}

impl Sink for LineChartSink {
    fn consume(&mut self, frame: &LongFrame) -> Result<()> {
        let (min_date, max_date) = frame
            .rows
            .iter()
            .map(|r| r.date)
            .minmax()
            .into_option()
            .ok_or(Error::EmptyPlot)?;
        // A single time point still needs a non-empty axis.
        let max_date = if max_date == min_date {
            max_date + Duration::days(1)
        } else {
            max_date
        };
        let (min_y, max_y) = frame
            .rows
            .iter()
            .map(|r| r.value)
            .fold((0.0f64, f64::MIN), |(lo, hi), v| (lo.min(v), hi.max(v)));
        let max_y = if max_y <= min_y { min_y + 1.0 } else { max_y * 1.05 };

        let root = BitMapBackend::new(&self.path, self.size).into_drawing_area();
        root.fill(&WHITE).map_err(chart_err)?;
        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .caption(&self.caption, ("sans-serif", 32))
            .set_label_area_size(LabelAreaPosition::Left, 60)
            .set_label_area_size(LabelAreaPosition::Bottom, 40)
            .build_cartesian_2d(min_date..max_date, min_y..max_y)
            .map_err(chart_err)?;
        chart
            .configure_mesh()
            .x_labels(7)
            .x_desc(frame.roles.date.as_str())
            .y_desc(frame.roles.value.as_str())
            .draw()
            .map_err(chart_err)?;

        let lines = frame
            .rows
            .iter()
            .into_group_map_by(|r| (r.entity.clone(), r.series.clone()));
        let lines = lines.into_iter().sorted_by(|a, b| a.0.cmp(&b.0));
        for (color, ((entity, series), mut rows)) in lines.enumerate() {
            rows.sort_by_key(|r| r.date);
            let style = ShapeStyle {
                color: Palette99::pick(color).to_rgba(),
                filled: true,
                stroke_width: 2,
            };
            chart
                .draw_series(LineSeries::new(
                    rows.iter().map(|r| (r.date, r.value)),
                    style.clone(),
                ))
                .map_err(chart_err)?
                .label(format!("{entity} {series}"))
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], style.clone()));
        }
        chart
            .configure_series_labels()
            .border_style(&BLACK)
            .background_style(WHITE.mix(0.8))
            .position(SeriesLabelPosition::UpperLeft)
            .draw()
            .map_err(chart_err)?;
        root.present().map_err(chart_err)?;
        info!("rendered {} rows to {}", frame.rows.len(), self.path.display());
        Ok(())
    }
}
