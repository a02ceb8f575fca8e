//! Rendering widget seam for the display loop
//!
//! The display loop only ever hands `(current, total)` to a renderer; how it
//! is drawn is up to the implementation.

use crate::config::DisplayConfig;
use crate::error::{ProgressError, ProgressResult};
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

/// Something that can draw aggregate progress
pub trait ProgressRenderer: Send {
    /// Draw the current aggregate. Called once per refresh tick.
    fn render(&mut self, current: i64, total: i64);

    /// Final draw before the display loop returns
    fn finish(&mut self, current: i64, total: i64) {
        self.render(current, total);
    }
}

/// Adapts a closure into a renderer
pub struct FnRenderer<F>(pub F);

impl<F> ProgressRenderer for FnRenderer<F>
where
    F: FnMut(i64, i64) + Send,
{
    fn render(&mut self, current: i64, total: i64) {
        (self.0)(current, total)
    }
}

const BAR_TEMPLATE: &str =
    "{prefix}[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg} ({percent}%, eta {eta})";

/// Terminal progress bar on stderr, backed by indicatif
pub struct IndicatifRenderer {
    bar: ProgressBar,
}

impl IndicatifRenderer {
    pub fn new(config: &DisplayConfig) -> ProgressResult<Self> {
        let target = if config.hidden {
            ProgressDrawTarget::hidden()
        } else {
            ProgressDrawTarget::stderr()
        };
        let style = ProgressStyle::with_template(BAR_TEMPLATE)
            .map_err(|e| ProgressError::Config(format!("invalid bar template: {}", e)))?
            .progress_chars("=> ");

        let bar = ProgressBar::with_draw_target(Some(0), target);
        bar.set_style(style);
        bar.set_message(config.unit.clone());
        if let Some(description) = &config.description {
            bar.set_prefix(format!("{}: ", description));
        }
        Ok(Self { bar })
    }

    pub fn is_hidden(&self) -> bool {
        self.bar.is_hidden()
    }

    pub fn position(&self) -> u64 {
        self.bar.position()
    }

    pub fn length(&self) -> Option<u64> {
        self.bar.length()
    }

    fn update(&self, current: i64, total: i64) {
        self.bar.set_length(total.max(0) as u64);
        self.bar.set_position(current.max(0) as u64);
    }
}

impl ProgressRenderer for IndicatifRenderer {
    fn render(&mut self, current: i64, total: i64) {
        self.update(current, total);
    }

    fn finish(&mut self, current: i64, total: i64) {
        self.update(current, total);
        if current >= total {
            self.bar.finish();
        } else {
            self.bar.abandon();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fn_renderer_records_frames() {
        let mut frames = Vec::new();
        {
            let mut renderer = FnRenderer(|c, t| frames.push((c, t)));
            renderer.render(1, 10);
            renderer.finish(10, 10);
        }
        assert_eq!(frames, vec![(1, 10), (10, 10)]);
    }

    #[test]
    fn test_hidden_indicatif_tracks_position() {
        let config = DisplayConfig {
            hidden: true,
            description: Some("test".to_string()),
            ..DisplayConfig::default()
        };
        let mut renderer = IndicatifRenderer::new(&config).unwrap();
        assert!(renderer.is_hidden());

        renderer.render(3, 12);
        assert_eq!(renderer.position(), 3);
        assert_eq!(renderer.length(), Some(12));

        renderer.finish(12, 12);
        assert_eq!(renderer.position(), 12);
    }

    #[test]
    fn test_negative_values_clamp_to_zero() {
        let config = DisplayConfig {
            hidden: true,
            ..DisplayConfig::default()
        };
        let mut renderer = IndicatifRenderer::new(&config).unwrap();
        renderer.render(-5, -2);
        assert_eq!(renderer.position(), 0);
        assert_eq!(renderer.length(), Some(0));
    }
}
