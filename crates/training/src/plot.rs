//! Training-curve image and history export.
//!
//! Two side-by-side panels (accuracy left, loss right), train series in blue,
//! validation in orange, drawn straight into an RGB buffer.

use std::fs;
use std::path::Path;

use image::{Rgb, RgbImage};

use crate::error::{TrainingError, TrainingResult};
use crate::history::TrainingHistory;

pub const PLOT_WIDTH: u32 = 960;
pub const PLOT_HEIGHT: u32 = 400;

pub const TRAIN_COLOR: Rgb<u8> = Rgb([31, 119, 180]);
pub const VAL_COLOR: Rgb<u8> = Rgb([255, 127, 14]);
const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([40, 40, 40]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);

const MARGIN_LEFT: u32 = 40;
const MARGIN_RIGHT: u32 = 16;
const MARGIN_TOP: u32 = 28;
const MARGIN_BOTTOM: u32 = 32;

/// Pixel rectangle `[x0, y0, x1, y1]` of one panel's plotting area.
#[derive(Debug, Clone, Copy)]
struct Panel {
    x0: u32,
    y0: u32,
    x1: u32,
    y1: u32,
}

impl Panel {
    fn new(index: u32, panels: u32) -> Self {
        let panel_w = PLOT_WIDTH / panels;
        let left = index * panel_w;
        Self {
            x0: left + MARGIN_LEFT,
            y0: MARGIN_TOP,
            x1: left + panel_w - MARGIN_RIGHT,
            y1: PLOT_HEIGHT - MARGIN_BOTTOM,
        }
    }

    /// Map (epoch index, value) into pixels; `y_max` is the top of the value axis.
    fn to_px(&self, i: usize, n: usize, value: f32, y_max: f32) -> (i64, i64) {
        let w = (self.x1 - self.x0) as f32;
        let h = (self.y1 - self.y0) as f32;
        let fx = if n > 1 { i as f32 / (n - 1) as f32 } else { 0.5 };
        let fy = if y_max > 0.0 && value.is_finite() {
            (value / y_max).clamp(0.0, 1.0)
        } else {
            0.0
        };
        (
            (self.x0 as f32 + fx * w).round() as i64,
            (self.y1 as f32 - fy * h).round() as i64,
        )
    }
}

/// Render accuracy and loss curves for every completed epoch to a PNG at `path`.
pub fn render_history(history: &TrainingHistory, path: &Path) -> TrainingResult<()> {
    let img = draw_history(history);
    ensure_parent(path)?;
    img.save(path).map_err(|source| TrainingError::Image {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::info!(path = %path.display(), epochs = history.len(), "wrote training curves");
    Ok(())
}

/// Pretty-printed JSON of all epoch records.
pub fn write_history_json(history: &TrainingHistory, path: &Path) -> TrainingResult<()> {
    ensure_parent(path)?;
    let file = fs::File::create(path).map_err(|source| TrainingError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer_pretty(file, history).map_err(|source| TrainingError::Json {
        path: path.to_path_buf(),
        source,
    })
}

pub fn draw_history(history: &TrainingHistory) -> RgbImage {
    let mut img = RgbImage::from_pixel(PLOT_WIDTH, PLOT_HEIGHT, BACKGROUND);

    let accuracy = Panel::new(0, 2);
    draw_axes(&mut img, accuracy);
    draw_series(&mut img, accuracy, &history.train_accuracy(), 1.0, TRAIN_COLOR);
    draw_series(&mut img, accuracy, &history.val_accuracy(), 1.0, VAL_COLOR);

    let loss = Panel::new(1, 2);
    let loss_max = history
        .train_loss()
        .into_iter()
        .chain(history.val_loss())
        .filter(|v| v.is_finite())
        .fold(0.0f32, f32::max)
        * 1.05;
    draw_axes(&mut img, loss);
    draw_series(&mut img, loss, &history.train_loss(), loss_max, TRAIN_COLOR);
    draw_series(&mut img, loss, &history.val_loss(), loss_max, VAL_COLOR);

    for panel in [accuracy, loss] {
        draw_legend(&mut img, panel);
    }
    img
}

fn ensure_parent(path: &Path) -> TrainingResult<()> {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            fs::create_dir_all(parent).map_err(|source| TrainingError::Io {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}

fn draw_axes(img: &mut RgbImage, p: Panel) {
    for tick in 1..=4 {
        let y = p.y1 - (p.y1 - p.y0) * tick / 4;
        hline(img, p.x0, p.x1, y, GRID);
    }
    hline(img, p.x0, p.x1, p.y1, AXIS);
    vline(img, p.x0, p.y0, p.y1, AXIS);
}

fn draw_series(img: &mut RgbImage, p: Panel, values: &[f32], y_max: f32, color: Rgb<u8>) {
    let n = values.len();
    let points: Vec<(i64, i64)> = values
        .iter()
        .enumerate()
        .map(|(i, &v)| p.to_px(i, n, v, y_max))
        .collect();
    for pair in points.windows(2) {
        draw_line(img, pair[0], pair[1], color);
    }
    for &(x, y) in &points {
        fill_rect(img, x - 2, y - 2, 5, 5, color);
    }
}

fn draw_legend(img: &mut RgbImage, p: Panel) {
    let x = p.x1 as i64 - 40;
    let y = p.y0 as i64 + 6;
    fill_rect(img, x, y, 24, 4, TRAIN_COLOR);
    fill_rect(img, x, y + 10, 24, 4, VAL_COLOR);
}

fn hline(img: &mut RgbImage, x0: u32, x1: u32, y: u32, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    if y >= h {
        return;
    }
    for x in x0..=x1.min(w - 1) {
        img.put_pixel(x, y, color);
    }
}

fn vline(img: &mut RgbImage, x: u32, y0: u32, y1: u32, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    if x >= w {
        return;
    }
    for y in y0..=y1.min(h - 1) {
        img.put_pixel(x, y, color);
    }
}

fn put(img: &mut RgbImage, x: i64, y: i64, color: Rgb<u8>) {
    let (w, h) = img.dimensions();
    if x >= 0 && y >= 0 && (x as u32) < w && (y as u32) < h {
        img.put_pixel(x as u32, y as u32, color);
    }
}

fn fill_rect(img: &mut RgbImage, x: i64, y: i64, w: i64, h: i64, color: Rgb<u8>) {
    for yy in y..y + h {
        for xx in x..x + w {
            put(img, xx, yy, color);
        }
    }
}

/// Bresenham, two pixels thick.
fn draw_line(img: &mut RgbImage, from: (i64, i64), to: (i64, i64), color: Rgb<u8>) {
    let (mut x, mut y) = from;
    let dx = (to.0 - x).abs();
    let dy = -(to.1 - y).abs();
    let sx = if x < to.0 { 1 } else { -1 };
    let sy = if y < to.1 { 1 } else { -1 };
    let mut err = dx + dy;
    loop {
        put(img, x, y, color);
        put(img, x, y + 1, color);
        if x == to.0 && y == to.1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::EpochRecord;

    fn history(epochs: usize) -> TrainingHistory {
        let mut h = TrainingHistory::with_capacity(epochs);
        for epoch in 0..epochs {
            h.push(EpochRecord {
                epoch,
                learning_rate: 0.01,
                train_loss: 2.0 / (epoch + 1) as f32,
                train_accuracy: 0.3 + 0.1 * epoch as f32,
                val_loss: 2.5 / (epoch + 1) as f32,
                val_accuracy: 0.25 + 0.1 * epoch as f32,
            })
            .unwrap();
        }
        h
    }

    fn count(img: &RgbImage, color: Rgb<u8>) -> usize {
        img.pixels().filter(|p| **p == color).count()
    }

    #[test]
    fn both_series_are_drawn() {
        let img = draw_history(&history(5));
        assert_eq!(img.dimensions(), (PLOT_WIDTH, PLOT_HEIGHT));
        // Legend swatches alone are 96 pixels per color; curves add more.
        assert!(count(&img, TRAIN_COLOR) > 200);
        assert!(count(&img, VAL_COLOR) > 200);
    }

    #[test]
    fn empty_history_still_renders_axes() {
        let img = draw_history(&TrainingHistory::with_capacity(3));
        assert!(count(&img, AXIS) > 0);
    }

    #[test]
    fn writes_png_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("nested/curves.png");
        let json = dir.path().join("nested/history.json");
        let h = history(3);
        render_history(&h, &png).unwrap();
        write_history_json(&h, &json).unwrap();

        let decoded = image::open(&png).unwrap();
        assert_eq!(decoded.width(), PLOT_WIDTH);
        let back: TrainingHistory =
            serde_json::from_str(&std::fs::read_to_string(&json).unwrap()).unwrap();
        assert_eq!(back, h);
    }
}
