//! Visual challenge solving
//!
//! Pixel/coordinate solving is delegated to an external paid service; this
//! module only carries the service client and the solution validation the
//! challenge loop needs before acting on coordinates.

pub mod solver;

pub use solver::TwoCaptchaClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// One solver coordinate, relative to the submitted screenshot
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

/// A solved challenge: the service-side id plus an ordered coordinate list
#[derive(Debug, Clone, PartialEq)]
pub struct CaptchaSolution {
    pub id: String,
    pub points: Vec<Point>,
}

impl CaptchaSolution {
    /// Whether this solution is usable for a drag-type challenge.
    ///
    /// Drag solutions are consumed as (start, end) pairs, so the coordinate
    /// count must be even and non-zero. Invalid solutions must be reported
    /// back to the service and discarded, never acted on.
    pub fn validate_drag(&self) -> bool {
        !self.points.is_empty() && self.points.len() % 2 == 0
    }

    /// Drag pairs in submission order. Empty for invalid solutions.
    pub fn drag_pairs(&self) -> Vec<(Point, Point)> {
        if !self.validate_drag() {
            return Vec::new();
        }
        self.points.chunks_exact(2).map(|p| (p[0], p[1])).collect()
    }
}

/// Coordinate-solving service seam.
///
/// Production uses [`TwoCaptchaClient`]; tests substitute scripted solvers.
#[async_trait]
pub trait CaptchaSolver: Send + Sync {
    /// Solve a coordinate challenge from a base64 screenshot, with optional
    /// text and image instructions for drag-type challenges.
    async fn coordinates(
        &self,
        image_b64: &str,
        instructions: Option<&str>,
        instruction_image_b64: Option<&str>,
    ) -> Result<CaptchaSolution>;

    /// Report a solution as unusable
    async fn report_bad(&self, id: &str) -> Result<()>;
}
