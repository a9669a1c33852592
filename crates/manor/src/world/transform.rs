use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    fn add(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x + other.x, self.y + other.y, self.z + other.z)
    }

    fn sub(self, other: Vec3) -> Vec3 {
        Vec3::new(self.x - other.x, self.y - other.y, self.z - other.z)
    }

    fn rotated_y(self, yaw_radians: f32) -> Vec3 {
        if yaw_radians == 0.0 {
            return self;
        }
        let (sin, cos) = yaw_radians.sin_cos();
        Vec3::new(
            self.x * cos + self.z * sin,
            self.y,
            -self.x * sin + self.z * cos,
        )
    }

    fn distance_squared(self, other: Vec3) -> f32 {
        let d = self.sub(other);
        d.x * d.x + d.y * d.y + d.z * d.z
    }
}

/// Placement of a node relative to its parent (or to the world for roots).
#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct Transform {
    pub position: Vec3,
    pub yaw_radians: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Transform {
    pub const IDENTITY: Transform = Transform {
        position: Vec3::ZERO,
        yaw_radians: 0.0,
    };

    pub const fn from_position(position: Vec3) -> Self {
        Self {
            position,
            yaw_radians: 0.0,
        }
    }

    pub fn then(&self, local: &Transform) -> Transform {
        Transform {
            position: self.position.add(local.position.rotated_y(self.yaw_radians)),
            yaw_radians: self.yaw_radians + local.yaw_radians,
        }
    }

    /// Inverse of [`Transform::then`]: expresses world transform `self` in `parent` space.
    pub fn relative_to(&self, parent: &Transform) -> Transform {
        Transform {
            position: self
                .position
                .sub(parent.position)
                .rotated_y(-parent.yaw_radians),
            yaw_radians: self.yaw_radians - parent.yaw_radians,
        }
    }

    pub fn approx_eq(&self, other: &Transform, epsilon: f32) -> bool {
        self.position.distance_squared(other.position) <= epsilon * epsilon
            && (self.yaw_radians - other.yaw_radians).abs() <= epsilon
    }
}
