use foundation::math::Vec3;
use scene::components::Transform;
use scene::resources::{Material, MeshHandle, Resources};
use scene::world::World;
use serde::{Deserialize, Serialize};

pub type Mat4 = [[f32; 4]; 4];

pub const IDENTITY: Mat4 = [
    [1.0, 0.0, 0.0, 0.0],
    [0.0, 1.0, 0.0, 0.0],
    [0.0, 0.0, 1.0, 0.0],
    [0.0, 0.0, 0.0, 1.0],
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    pub fov_y_deg: f64,
    pub near: f64,
    pub far: f64,
    /// Distance from the globe centre along +Z.
    pub distance: f64,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_y_deg: 70.0,
            near: 0.1,
            far: 1000.0,
            distance: 2.5,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Camera3D {
    pub position: Vec3,
    pub target: Vec3,
    pub fov_y_rad: f64,
    pub near: f64,
    pub far: f64,
    pub aspect: f64,
}

impl Camera3D {
    pub fn look_at(position: Vec3, target: Vec3, fov_y_rad: f64, near: f64, far: f64) -> Self {
        Self {
            position,
            target,
            fov_y_rad,
            near,
            far,
            aspect: 1.0,
        }
    }

    /// Perspective camera on +Z looking at the origin.
    pub fn from_config(config: &CameraConfig) -> Self {
        Self::look_at(
            Vec3::new(0.0, 0.0, config.distance),
            Vec3::ZERO,
            config.fov_y_deg.to_radians(),
            config.near,
            config.far,
        )
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f64 / height.max(1) as f64;
    }

    pub fn view(&self) -> Mat4 {
        mat4_look_at_rh(self.position, self.target, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        mat4_perspective_rh_z0(self.fov_y_rad, self.aspect, self.near, self.far)
    }

    pub fn view_proj(&self) -> Mat4 {
        mat4_mul(self.projection(), self.view())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Lighting {
    pub ambient: f32,
    pub directional: f32,
    /// Direction the light comes from, world space.
    pub direction: [f32; 3],
    pub color: [f32; 3],
}

impl Default for Lighting {
    fn default() -> Self {
        Self {
            ambient: 0.6,
            directional: 0.8,
            direction: [5.0, 3.0, 5.0],
            color: [1.0, 1.0, 1.0],
        }
    }
}

impl Lighting {
    pub fn unit_direction(&self) -> [f32; 3] {
        let [x, y, z] = self.direction;
        Vec3::new(x as f64, y as f64, z as f64)
            .try_normalize()
            .unwrap_or(Vec3::Y)
            .to_f32_array()
    }
}

#[derive(Debug, Copy, Clone, PartialEq)]
pub enum RenderCommand {
    DrawMesh {
        mesh: MeshHandle,
        material: Material,
        model: Mat4,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    pub view_proj: Mat4,
    pub camera_position: [f32; 3],
    pub lighting: Lighting,
    pub commands: Vec<RenderCommand>,
    /// Meshes whose GPU buffers can be destroyed.
    pub released_meshes: Vec<MeshHandle>,
}

impl Default for RenderFrame {
    fn default() -> Self {
        Self {
            view_proj: IDENTITY,
            camera_position: [0.0; 3],
            lighting: Lighting::default(),
            commands: Vec::new(),
            released_meshes: Vec::new(),
        }
    }
}

pub struct Renderer;

impl Renderer {
    /// Opaque draws first, then translucent ones, each group in entity order.
    pub fn collect(
        world: &World,
        resources: &Resources,
        camera: &Camera3D,
        lighting: &Lighting,
    ) -> RenderFrame {
        let mut opaque = Vec::new();
        let mut translucent = Vec::new();
        for (_, transform, drawable) in world.drawables_3d() {
            let Some(material) = resources.material(drawable.material) else {
                continue;
            };
            if resources.mesh(drawable.mesh).is_none_or(|m| m.is_empty()) {
                continue;
            }
            let command = RenderCommand::DrawMesh {
                mesh: drawable.mesh,
                material: *material,
                model: model_matrix(&transform),
            };
            if material.opacity < 1.0 {
                translucent.push(command);
            } else {
                opaque.push(command);
            }
        }
        opaque.extend(translucent);

        RenderFrame {
            view_proj: camera.view_proj(),
            camera_position: camera.position.to_f32_array(),
            lighting: lighting.clone(),
            commands: opaque,
            released_meshes: Vec::new(),
        }
    }
}

/// Column-major matrix equivalent to [`Transform::apply`].
pub fn model_matrix(transform: &Transform) -> Mat4 {
    let (s, c) = transform.rotation_y.sin_cos();
    let k = transform.scale;
    let p = transform.position;
    [
        [(c * k) as f32, 0.0, (-s * k) as f32, 0.0],
        [0.0, k as f32, 0.0, 0.0],
        [(s * k) as f32, 0.0, (c * k) as f32, 0.0],
        [p.x as f32, p.y as f32, p.z as f32, 1.0],
    ]
}

pub fn mat4_mul(a: Mat4, b: Mat4) -> Mat4 {
    let mut c = [[0.0f32; 4]; 4];
    for col in 0..4 {
        for row in 0..4 {
            c[col][row] = a[0][row] * b[col][0]
                + a[1][row] * b[col][1]
                + a[2][row] * b[col][2]
                + a[3][row] * b[col][3];
        }
    }
    c
}

pub fn mat4_mul_vec4(m: Mat4, v: [f32; 4]) -> [f32; 4] {
    let mut out = [0.0f32; 4];
    for (row, value) in out.iter_mut().enumerate() {
        *value = m[0][row] * v[0] + m[1][row] * v[1] + m[2][row] * v[2] + m[3][row] * v[3];
    }
    out
}

/// Right-handed perspective with depth in `[0, 1]`.
pub fn mat4_perspective_rh_z0(fov_y_rad: f64, aspect: f64, near: f64, far: f64) -> Mat4 {
    let f = 1.0 / (0.5 * fov_y_rad).tan();
    let m00 = (f / aspect) as f32;
    let m11 = f as f32;
    let m22 = (far / (near - far)) as f32;
    let m23 = ((near * far) / (near - far)) as f32;

    [
        [m00, 0.0, 0.0, 0.0],
        [0.0, m11, 0.0, 0.0],
        [0.0, 0.0, m22, -1.0],
        [0.0, 0.0, m23, 0.0],
    ]
}

pub fn mat4_look_at_rh(eye: Vec3, target: Vec3, up: Vec3) -> Mat4 {
    let f = (target - eye).normalize();
    let s = f.cross(up).normalize();
    let u = s.cross(f);

    let ex = -s.dot(eye);
    let ey = -u.dot(eye);
    let ez = f.dot(eye);

    [
        [s.x as f32, u.x as f32, (-f.x) as f32, 0.0],
        [s.y as f32, u.y as f32, (-f.y) as f32, 0.0],
        [s.z as f32, u.z as f32, (-f.z) as f32, 0.0],
        [ex as f32, ey as f32, ez as f32, 1.0],
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use scene::components::Drawable3D;
    use scene::mesh::Mesh;
    use pretty_assertions::assert_eq;

    fn assert_close(a: f32, b: f32, eps: f32) {
        assert!((a - b).abs() <= eps, "expected {a} ~= {b} (eps={eps})");
    }

    #[test]
    fn model_matrix_matches_transform() {
        let transform = Transform {
            position: Vec3::new(0.5, -1.0, 2.0),
            rotation_y: 0.9,
            scale: 1.7,
        };
        let p = Vec3::new(0.3, 0.2, -0.6);
        let expected = transform.apply(p);
        let got = mat4_mul_vec4(model_matrix(&transform), [p.x as f32, p.y as f32, p.z as f32, 1.0]);
        assert_close(got[0], expected.x as f32, 1e-5);
        assert_close(got[1], expected.y as f32, 1e-5);
        assert_close(got[2], expected.z as f32, 1e-5);
        assert_close(got[3], 1.0, 0.0);
    }

    #[test]
    fn camera_target_projects_to_screen_centre() {
        let mut camera = Camera3D::from_config(&CameraConfig::default());
        camera.set_viewport(1600, 900);
        let clip = mat4_mul_vec4(camera.view_proj(), [0.0, 0.0, 0.0, 1.0]);
        assert_close(clip[0] / clip[3], 0.0, 1e-6);
        assert_close(clip[1] / clip[3], 0.0, 1e-6);
        let depth = clip[2] / clip[3];
        assert!((0.0..=1.0).contains(&depth));
    }

    #[test]
    fn viewport_is_clamped() {
        let mut camera = Camera3D::from_config(&CameraConfig::default());
        camera.set_viewport(0, 0);
        assert_eq!(camera.aspect, 1.0);
        camera.set_viewport(200, 100);
        assert_eq!(camera.aspect, 2.0);
    }

    #[test]
    fn collect_orders_translucent_last_and_skips_empty() {
        let mut world = World::new();
        let mut res = Resources::new();
        let sphere = res.add_mesh(Mesh::uv_sphere(1.0, 4, 4));
        let empty = res.add_mesh(Mesh::new());
        let glass = res.add_material(Material {
            opacity: 0.5,
            ..Material::default()
        });
        let solid = res.add_material(Material::default());

        let a = world.spawn();
        world.set_drawable_3d(a, Drawable3D::new(sphere, glass));
        let b = world.spawn();
        world.set_drawable_3d(b, Drawable3D::new(sphere, solid));
        let c = world.spawn();
        world.set_drawable_3d(c, Drawable3D::new(empty, solid));

        let camera = Camera3D::from_config(&CameraConfig::default());
        let frame = Renderer::collect(&world, &res, &camera, &Lighting::default());
        let opacities: Vec<f32> = frame
            .commands
            .iter()
            .map(|RenderCommand::DrawMesh { material, .. }| material.opacity)
            .collect();
        assert_eq!(opacities, vec![1.0, 0.5]);
    }

    #[test]
    fn released_material_drops_draw() {
        let mut world = World::new();
        let mut res = Resources::new();
        let mesh = res.add_mesh(Mesh::uv_sphere(1.0, 4, 4));
        let material = res.add_material(Material::default());
        let e = world.spawn();
        world.set_drawable_3d(e, Drawable3D::new(mesh, material));
        res.release_material(material);

        let camera = Camera3D::from_config(&CameraConfig::default());
        let frame = Renderer::collect(&world, &res, &camera, &Lighting::default());
        assert!(frame.commands.is_empty());
    }
}
