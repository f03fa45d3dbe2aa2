//! Per-frame environment capture: cubes orbit a reflective model, the world
//! is rendered into a cubemap from the model's position every frame (mips
//! regenerated), and the model samples it for blurry reflections.
//!
//! Run from the repository root so `demos/assets/` resolves.

use proscenium::*;

const LIT_SHADER: &str = r#"
struct Uniforms {
    view_proj: mat4x4f,
    model: mat4x4f,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(0) @binding(1) var albedo: texture_2d<f32>;
@group(0) @binding(2) var albedo_sampler: sampler;

struct VsOut {
    @builtin(position) position: vec4f,
    @location(0) normal: vec3f,
    @location(1) uv: vec2f,
}

@vertex
fn vs_main(
    @location(0) position: vec3f,
    @location(1) normal: vec3f,
    @location(2) uv: vec2f,
) -> VsOut {
    var out: VsOut;
    out.position = u.view_proj * u.model * vec4f(position, 1.0);
    out.normal = normalize((u.model * vec4f(normal, 0.0)).xyz);
    out.uv = uv;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4f {
    let light = normalize(vec3f(0.4, 1.0, 0.3));
    let diffuse = max(dot(normalize(in.normal), light), 0.0) * 0.8 + 0.2;
    return textureSample(albedo, albedo_sampler, in.uv) * diffuse;
}
"#;

const REFLECT_SHADER: &str = r#"
struct Uniforms {
    view_proj: mat4x4f,
    model: mat4x4f,
    camera_pos: vec3f,
    lod: f32,
}

@group(0) @binding(0) var<uniform> u: Uniforms;
@group(0) @binding(1) var environment: texture_cube<f32>;
@group(0) @binding(2) var env_sampler: sampler;

struct VsOut {
    @builtin(position) position: vec4f,
    @location(0) world_pos: vec3f,
    @location(1) normal: vec3f,
}

@vertex
fn vs_main(
    @location(0) position: vec3f,
    @location(1) normal: vec3f,
    @location(2) uv: vec2f,
) -> VsOut {
    let world = u.model * vec4f(position, 1.0);
    var out: VsOut;
    out.position = u.view_proj * world;
    out.world_pos = world.xyz;
    out.normal = normalize((u.model * vec4f(normal, 0.0)).xyz);
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4f {
    let view_dir = normalize(in.world_pos - u.camera_pos);
    let reflected = reflect(view_dir, normalize(in.normal));
    return textureSampleLevel(environment, env_sampler, reflected, u.lod);
}
"#;

const SKY: wgpu::Color = wgpu::Color {
    r: 0.35,
    g: 0.55,
    b: 0.8,
    a: 1.0,
};
const CAPTURE_SIZE: u32 = 256;

struct CubemapScene {
    lit_capture: Option<ShaderProgram>,
    lit_main: Option<ShaderProgram>,
    reflect: Option<ShaderProgram>,
    orbiter: Option<Mesh>,
    model: Option<Mesh>,
    capture: Option<CubemapCapture>,
    mips: Option<MipmapGenerator>,
    depth: Option<RenderTarget>,
    camera: Camera,
    controller: FlyCameraController,
}

impl CubemapScene {
    fn new() -> Self {
        let camera = Camera::looking_at(
            Vec3::new(0.0, 1.5, 5.0),
            Vec3::ZERO,
            std::f32::consts::FRAC_PI_3,
            16.0 / 9.0,
        );
        Self {
            lit_capture: None,
            lit_main: None,
            reflect: None,
            orbiter: None,
            model: None,
            capture: None,
            mips: None,
            depth: None,
            controller: FlyCameraController::from_camera(&camera),
            camera,
        }
    }

    fn lit_desc(format: wgpu::TextureFormat) -> PipelineDesc {
        PipelineDesc::new(format)
            .depth(wgpu::TextureFormat::Depth32Float, true)
            .stream(StreamLayout::vec3("position", 0))
            .stream(StreamLayout::vec3("normal", 1))
            .stream(StreamLayout::vec2("texcoord", 2))
            .uniforms(
                UniformLayout::new()
                    .with("view_proj", UniformType::Mat4)
                    .with("model", UniformType::Mat4),
            )
            .texture(TextureSlot::d2("albedo"))
    }

    fn orbiter_transforms(time: f32) -> Vec<Mat4> {
        (0..5)
            .map(|i| {
                let angle = time * 0.5 + i as f32 * std::f32::consts::TAU / 5.0;
                Mat4::from_translation(Vec3::new(
                    angle.cos() * 2.5,
                    (time * 0.8 + i as f32).sin() * 0.5,
                    angle.sin() * 2.5,
                )) * Mat4::from_rotation_y(time + i as f32)
                    * Mat4::from_scale(Vec3::splat(0.6))
            })
            .collect()
    }
}

impl Scene for CubemapScene {
    fn load(&mut self) -> Manifest {
        Manifest::new()
            .with("model", "demos/assets/cube.obj", AssetKind::Text)
            .with("checker", "demos/assets/checker.ppm", AssetKind::Image)
    }

    fn start(&mut self, gpu: &GpuContext, assets: &AssetBundle) -> Result<()> {
        let mut mips = MipmapGenerator::new(gpu);
        let albedo = Texture::from_image(gpu, &mut mips, assets.image("checker")?, "Orbiter Albedo");

        let capture = CubemapCapture::new(gpu, CAPTURE_SIZE, wgpu::TextureFormat::Rgba8UnormSrgb)?;

        let mut lit_capture = build_program(
            gpu,
            "lit (capture)",
            LIT_SHADER,
            &Self::lit_desc(capture.format),
        )?;
        lit_capture.bind_texture("albedo", &albedo.view);
        let mut lit_main =
            build_program(gpu, "lit (main)", LIT_SHADER, &Self::lit_desc(gpu.config.format))?;
        lit_main.bind_texture("albedo", &albedo.view);

        let reflect_desc = PipelineDesc::new(gpu.config.format)
            .depth(wgpu::TextureFormat::Depth32Float, true)
            .stream(StreamLayout::vec3("position", 0))
            .stream(StreamLayout::vec3("normal", 1))
            .stream(StreamLayout::vec2("texcoord", 2))
            .uniforms(
                UniformLayout::new()
                    .with("view_proj", UniformType::Mat4)
                    .with("model", UniformType::Mat4)
                    .with("camera_pos", UniformType::Vec3)
                    .with("lod", UniformType::F32),
            )
            .texture(TextureSlot::cube("environment"));
        let mut reflect = build_program(gpu, "reflect", REFLECT_SHADER, &reflect_desc)?;
        reflect.bind_texture("environment", &capture.cube_view);

        self.orbiter = Some(cube().upload(gpu, "orbiter")?);
        self.model = Some(from_obj_text("model", assets.text("model")?)?.upload(gpu, "model")?);

        // Depth for the main pass; color goes straight to the surface.
        self.depth = Some(RenderTarget::new(
            gpu,
            &RenderTargetDesc::new("Main Depth", gpu.width(), gpu.height())
                .depth(wgpu::TextureFormat::Depth32Float),
        )?);

        self.lit_capture = Some(lit_capture);
        self.lit_main = Some(lit_main);
        self.reflect = Some(reflect);
        self.capture = Some(capture);
        self.mips = Some(mips);
        Ok(())
    }

    fn draw(&mut self, ctx: &mut FrameContext<'_>, dt: f32) -> Result<()> {
        let gpu = ctx.gpu;
        let (
            Some(lit_capture),
            Some(lit_main),
            Some(reflect),
            Some(orbiter),
            Some(model),
            Some(capture),
            Some(mips),
            Some(depth),
        ) = (
            self.lit_capture.as_mut(),
            self.lit_main.as_mut(),
            self.reflect.as_mut(),
            self.orbiter.as_ref(),
            self.model.as_ref(),
            self.capture.as_ref(),
            self.mips.as_mut(),
            self.depth.as_mut(),
        )
        else {
            return Ok(());
        };

        self.controller.update(&mut self.camera, ctx.input, dt);
        self.camera.set_aspect(gpu.aspect());
        depth.ensure_size(gpu, gpu.width(), gpu.height());

        let transforms = Self::orbiter_transforms(ctx.time);
        let model_position = Vec3::new(0.0, 0.5, 0.0);

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Cubemap Demo Encoder"),
            });

        // Capture the surroundings from the model's position, one face at a
        // time, then refresh the mip chain so high LODs stay current.
        for face in 0..6 {
            let face_camera = CubemapCapture::face_camera(face, model_position, 0.1, 100.0);
            let view_proj = face_camera.view_projection();
            let mut pass = capture.begin_face_pass(&mut encoder, face, SKY);
            for transform in &transforms {
                lit_capture.set_uniform("view_proj", view_proj);
                lit_capture.set_uniform("model", *transform);
                lit_capture.bind(gpu, &mut pass)?;
                orbiter.draw(&mut pass)?;
            }
        }
        capture.regenerate_mips(gpu, mips, &mut encoder);

        {
            let depth_view = depth.depth_view().ok_or_else(|| Error::FramebufferIncomplete {
                label: "Main Depth".into(),
                issue: FramebufferIssue::MissingAttachment,
            })?;
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Main Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: ctx.surface_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(SKY),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let view_proj = self.camera.view_projection();
            for transform in &transforms {
                lit_main.set_uniform("view_proj", view_proj);
                lit_main.set_uniform("model", *transform);
                lit_main.bind(gpu, &mut pass)?;
                orbiter.draw(&mut pass)?;
            }

            reflect.set_uniform("view_proj", view_proj);
            reflect.set_uniform(
                "model",
                Mat4::from_translation(model_position) * Mat4::from_rotation_y(ctx.time * 0.2),
            );
            reflect.set_uniform("camera_pos", self.camera.position);
            // Sample a couple of mips down for a soft, frosted reflection.
            reflect.set_uniform("lod", 2.0f32);
            reflect.bind(gpu, &mut pass)?;
            model.draw(&mut pass)?;
        }

        gpu.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn end(&mut self, _gpu: &GpuContext) {
        self.lit_capture = None;
        self.lit_main = None;
        self.reflect = None;
        self.orbiter = None;
        self.model = None;
        self.capture = None;
        self.mips = None;
        self.depth = None;
    }
}

fn main() -> Result<()> {
    let mut game = Game::new(GameConfig {
        title: "cubemaps".into(),
        ..Default::default()
    });
    game.add_scenes(SceneRegistry::new().with("cubemaps", CubemapScene::new));
    game.run("cubemaps")
}
