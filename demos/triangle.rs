//! The smallest possible scene: one spinning triangle, no assets.

use proscenium::*;

const SHADER: &str = r#"
struct Uniforms {
    angle: f32,
}

@group(0) @binding(0) var<uniform> u: Uniforms;

struct VsOut {
    @builtin(position) position: vec4f,
    @location(0) color: vec3f,
}

@vertex
fn vs_main(@location(0) position: vec3f, @location(1) color: vec3f) -> VsOut {
    let c = cos(u.angle);
    let s = sin(u.angle);
    let rotated = vec2f(
        position.x * c - position.y * s,
        position.x * s + position.y * c,
    );

    var out: VsOut;
    out.position = vec4f(rotated, position.z, 1.0);
    out.color = color;
    return out;
}

@fragment
fn fs_main(in: VsOut) -> @location(0) vec4f {
    return vec4f(in.color, 1.0);
}
"#;

#[derive(Default)]
struct TriangleScene {
    program: Option<ShaderProgram>,
    mesh: Option<Mesh>,
}

impl Scene for TriangleScene {
    fn start(&mut self, gpu: &GpuContext, _assets: &AssetBundle) -> Result<()> {
        let desc = PipelineDesc::new(gpu.config.format)
            .stream(StreamLayout::vec3("position", 0))
            .stream(StreamLayout::vec3("color", 1))
            .cull(None)
            .uniforms(UniformLayout::new().with("angle", UniformType::F32));
        self.program = Some(build_program(gpu, "triangle", SHADER, &desc)?);

        let positions: [[f32; 3]; 3] = [[0.0, 0.6, 0.0], [-0.6, -0.4, 0.0], [0.6, -0.4, 0.0]];
        let colors: [[f32; 3]; 3] = [[1.0, 0.2, 0.2], [0.2, 1.0, 0.2], [0.2, 0.2, 1.0]];

        let mut mesh = Mesh::new(
            "triangle",
            &[
                StreamLayout::vec3("position", 0),
                StreamLayout::vec3("color", 1),
            ],
        );
        mesh.set_buffer_data(
            gpu,
            "position",
            bytemuck::cast_slice(&positions),
            UsageHint::Static,
        )?;
        mesh.set_buffer_data(gpu, "color", bytemuck::cast_slice(&colors), UsageHint::Static)?;
        self.mesh = Some(mesh);
        Ok(())
    }

    fn draw(&mut self, ctx: &mut FrameContext<'_>, _dt: f32) -> Result<()> {
        let (Some(program), Some(mesh)) = (self.program.as_mut(), self.mesh.as_ref()) else {
            return Ok(());
        };

        program.set_uniform("angle", ctx.time * 0.8);

        let mut encoder = ctx
            .gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Triangle Encoder"),
            });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Triangle Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: ctx.surface_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color {
                            r: 0.05,
                            g: 0.05,
                            b: 0.08,
                            a: 1.0,
                        }),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            program.bind(ctx.gpu, &mut pass)?;
            mesh.draw(&mut pass)?;
        }
        ctx.gpu.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn end(&mut self, _gpu: &GpuContext) {
        self.program = None;
        self.mesh = None;
    }
}

fn main() -> Result<()> {
    let mut game = Game::new(GameConfig {
        title: "triangle".into(),
        ..Default::default()
    });
    game.add_scenes(SceneRegistry::new().with("triangle", TriangleScene::default));
    game.run("triangle")
}
