//! Renders a small procedural scene into geometry buffers and resolves it
//! through the post-processing effects. Space cycles the active effect;
//! WASD/QE + mouse fly the camera.

use proscenium::*;

const GEOMETRY_SHADER: &str = r#"
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

struct FsOut {
    @location(0) color: vec4f,
    @location(1) normal: vec4f,
}

@fragment
fn fs_main(in: VsOut) -> FsOut {
    var out: FsOut;
    out.color = textureSample(albedo, albedo_sampler, in.uv);
    out.normal = vec4f(normalize(in.normal), 1.0);
    return out;
}
"#;

const EFFECTS: usize = 11;

fn effect(index: usize) -> PostEffect {
    match index % EFFECTS {
        0 => PostEffect::Blit,
        1 => PostEffect::light(),
        2 => PostEffect::fog(),
        3 => PostEffect::Edge,
        4 => PostEffect::ShowDepth,
        5 => PostEffect::ShowNormals,
        6 => PostEffect::Grayscale,
        7 => PostEffect::Distortion,
        8 => PostEffect::ChromaticAberration,
        9 => PostEffect::blur(),
        _ => PostEffect::radial_blur(),
    }
}

struct Object {
    mesh: Mesh,
    position: Vec3,
    spin: f32,
}

struct PostScene {
    program: Option<ShaderProgram>,
    objects: Vec<Object>,
    ground: Option<Mesh>,
    buffers: Option<GeometryBuffers>,
    post: Option<PostProcessPass>,
    camera: Camera,
    controller: FlyCameraController,
    effect_index: usize,
}

impl PostScene {
    fn new() -> Self {
        let camera = Camera::looking_at(
            Vec3::new(0.0, 2.0, 6.0),
            Vec3::new(0.0, 0.5, 0.0),
            std::f32::consts::FRAC_PI_3,
            16.0 / 9.0,
        );
        Self {
            program: None,
            objects: Vec::new(),
            ground: None,
            buffers: None,
            post: None,
            controller: FlyCameraController::from_camera(&camera),
            camera,
            effect_index: 0,
        }
    }
}

impl Scene for PostScene {
    fn start(&mut self, gpu: &GpuContext, _assets: &AssetBundle) -> Result<()> {
        let mut mips = MipmapGenerator::new(gpu);
        let checker = Texture::checkerboard(
            gpu,
            &mut mips,
            256,
            8,
            [220, 220, 220, 255],
            [60, 60, 70, 255],
            "Checker",
        );

        let desc = PipelineDesc::new(gpu.config.format)
            .color_targets(GeometryBuffers::color_targets())
            .depth(wgpu::TextureFormat::Depth32Float, true)
            .stream(StreamLayout::vec3("position", 0))
            .stream(StreamLayout::vec3("normal", 1))
            .stream(StreamLayout::vec2("texcoord", 2))
            .uniforms(
                UniformLayout::new()
                    .with("view_proj", UniformType::Mat4)
                    .with("model", UniformType::Mat4),
            )
            .texture(TextureSlot::d2("albedo"));
        let mut program = build_program(gpu, "geometry", GEOMETRY_SHADER, &desc)?;
        program.bind_texture("albedo", &checker.view);
        self.program = Some(program);

        self.ground = Some(plane(Vec2::splat(-8.0), Vec2::splat(8.0)).upload(gpu, "ground")?);
        self.objects = vec![
            Object {
                mesh: cube().upload(gpu, "cube")?,
                position: Vec3::new(-1.5, 0.5, 0.0),
                spin: 0.6,
            },
            Object {
                mesh: sphere(32, 16).upload(gpu, "sphere")?,
                position: Vec3::new(1.5, 0.5, -1.0),
                spin: 0.0,
            },
            Object {
                mesh: cube().upload(gpu, "cube2")?,
                position: Vec3::new(0.0, 0.5, -3.0),
                spin: -0.3,
            },
        ];

        self.buffers = Some(GeometryBuffers::new(gpu, gpu.width(), gpu.height())?);
        self.post = Some(PostProcessPass::new(gpu, gpu.config.format)?);
        Ok(())
    }

    fn draw(&mut self, ctx: &mut FrameContext<'_>, dt: f32) -> Result<()> {
        let gpu = ctx.gpu;
        let (Some(program), Some(ground), Some(buffers), Some(post)) = (
            self.program.as_mut(),
            self.ground.as_ref(),
            self.buffers.as_mut(),
            self.post.as_mut(),
        ) else {
            return Ok(());
        };

        if ctx.input.key_pressed(KeyCode::Space) {
            self.effect_index = (self.effect_index + 1) % EFFECTS;
            log::info!("post effect: {}", effect(self.effect_index).label());
        }

        self.controller.update(&mut self.camera, ctx.input, dt);
        self.camera.set_aspect(gpu.aspect());
        buffers.ensure_size(gpu, gpu.width(), gpu.height());

        let view_proj = self.camera.view_projection();

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Post Demo Encoder"),
            });
        {
            let mut pass = buffers.begin_pass(
                &mut encoder,
                wgpu::Color {
                    r: 0.25,
                    g: 0.45,
                    b: 0.65,
                    a: 1.0,
                },
            );

            program.set_uniform("view_proj", view_proj);
            program.set_uniform("model", Mat4::IDENTITY);
            program.bind(gpu, &mut pass)?;
            ground.draw(&mut pass)?;

            for object in &self.objects {
                let model = Mat4::from_translation(object.position)
                    * Mat4::from_rotation_y(ctx.time * object.spin);
                program.set_uniform("model", model);
                program.bind(gpu, &mut pass)?;
                object.mesh.draw(&mut pass)?;
            }
        }

        post.render(
            gpu,
            &mut encoder,
            buffers,
            &self.camera,
            ctx.surface_view,
            &effect(self.effect_index),
            ctx.time,
        )?;

        gpu.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn end(&mut self, _gpu: &GpuContext) {
        self.program = None;
        self.objects.clear();
        self.ground = None;
        self.buffers = None;
        self.post = None;
    }
}

fn main() -> Result<()> {
    let mut game = Game::new(GameConfig {
        title: "postprocessing (space cycles effects)".into(),
        ..Default::default()
    });
    game.add_scenes(SceneRegistry::new().with("post", PostScene::new));
    game.run("post")
}
