use glam::{DAffine2, DVec2};
use serde::{Deserialize, Serialize};

use plancad_core::geometry::{Bounds2D, Point2};

pub const MIN_SCALE: f64 = 0.05;
pub const MAX_SCALE: f64 = 50.0;
const DEFAULT_VIEWPORT: DVec2 = DVec2::new(1280.0, 800.0);
const FIT_PADDING: f64 = 40.0;

/// 画布视图变换：屏幕坐标 = 平移 + 旋转 · 缩放 · 世界坐标。
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewTransform {
    scale: f64,
    translation: DVec2,
    /// 角度制。
    rotation: f64,
    viewport: DVec2,
}

impl Default for ViewTransform {
    fn default() -> Self {
        Self {
            scale: 1.0,
            translation: DVec2::ZERO,
            rotation: 0.0,
            viewport: DEFAULT_VIEWPORT,
        }
    }
}

impl ViewTransform {
    #[inline]
    fn clamp_scale(value: f64) -> f64 {
        value.clamp(MIN_SCALE, MAX_SCALE)
    }

    #[inline]
    pub fn scale(&self) -> f64 {
        self.scale
    }

    #[inline]
    pub fn translation(&self) -> DVec2 {
        self.translation
    }

    #[inline]
    pub fn rotation(&self) -> f64 {
        self.rotation
    }

    #[inline]
    pub fn viewport(&self) -> DVec2 {
        self.viewport
    }

    pub fn set_viewport(&mut self, width: f64, height: f64) {
        self.viewport = DVec2::new(width.max(1.0), height.max(1.0));
    }

    pub fn set_scale(&mut self, scale: f64) {
        if scale.is_finite() {
            self.scale = Self::clamp_scale(scale);
        }
    }

    pub fn set_rotation(&mut self, degrees: f64) {
        if degrees.is_finite() {
            self.rotation = degrees.rem_euclid(360.0);
        }
    }

    pub fn set_translation(&mut self, translation: DVec2) {
        self.translation = translation;
    }

    /// 平移（屏幕像素）。
    pub fn pan(&mut self, dx: f64, dy: f64) {
        self.translation += DVec2::new(dx, dy);
    }

    /// 以屏幕上的锚点为中心缩放，锚点下的世界坐标保持不动。
    pub fn zoom_at(&mut self, anchor: DVec2, factor: f64) {
        if !factor.is_finite() || factor <= 0.0 {
            return;
        }
        let world = self.screen_to_world(anchor);
        self.scale = Self::clamp_scale(self.scale * factor);
        let drifted = self.world_to_screen(world).as_vec2();
        self.translation += anchor - drifted;
    }

    pub fn affine(&self) -> DAffine2 {
        DAffine2::from_scale_angle_translation(
            DVec2::splat(self.scale),
            self.rotation.to_radians(),
            self.translation,
        )
    }

    #[inline]
    pub fn world_to_screen(&self, point: Point2) -> Point2 {
        Point2::from_vec(self.affine().transform_point2(point.as_vec2()))
    }

    #[inline]
    pub fn screen_to_world(&self, screen: DVec2) -> Point2 {
        Point2::from_vec(self.affine().inverse().transform_point2(screen))
    }

    /// 让包围盒居中并尽量铺满视口，旋转归零。
    pub fn fit_bounds(&mut self, bounds: &Bounds2D) {
        if bounds.is_empty() {
            return;
        }
        let available = (self.viewport - DVec2::splat(FIT_PADDING * 2.0)).max(DVec2::ONE);
        let mut scale = f64::INFINITY;
        if bounds.width() > f64::EPSILON {
            scale = scale.min(available.x / bounds.width());
        }
        if bounds.height() > f64::EPSILON {
            scale = scale.min(available.y / bounds.height());
        }
        if scale.is_finite() {
            self.scale = Self::clamp_scale(scale);
        }
        self.rotation = 0.0;
        self.translation = self.viewport * 0.5 - bounds.center().as_vec2() * self.scale;
    }

    pub fn reset(&mut self) {
        let viewport = self.viewport;
        *self = Self {
            viewport,
            ..Self::default()
        };
    }
}
