//! Main renderer orchestration.
//!
//! [`Renderer`] owns every Vulkan object and drives the per-frame sequence:
//! deferred swapchain recreation, timeline-gated slot reuse, image acquire,
//! command recording with dynamic rendering, a single synchronization2
//! submission, and present.
//!
//! # Resource destruction order
//!
//! ManuallyDrop enforces teardown as: frame resources and semaphores, then
//! pipeline, geometry, depth buffer, swapchain, surface, and the instance
//! last, all after a full device idle.

use std::mem::ManuallyDrop;
use std::sync::Arc;

use ash::vk;
use bytemuck::{Pod, Zeroable};
use glam::{Mat4, Vec3};
use tracing::{debug, info};

use lantern_core::{FrameTimer, RenderConfig};
use lantern_platform::{Surface, Window};
use lantern_resources::Model;
use lantern_rhi::device::Device;
use lantern_rhi::instance::Instance;
use lantern_rhi::physical_device::{prefer_discrete, select_physical_device};
use lantern_rhi::pipeline::{CullMode, GraphicsPipelineBuilder, Pipeline, PipelineLayout};
use lantern_rhi::rendering::{
    ColorAttachment, DepthAttachment, RenderingConfig, transition_image_layout,
};
use lantern_rhi::shader::{Shader, ShaderCompiler, ShaderStage};
use lantern_rhi::swapchain::Swapchain;
use lantern_rhi::sync::{Semaphore, TimelineSemaphore};
use lantern_rhi::{RhiError, RhiResult};

use crate::ACQUIRE_SEMAPHORE_COUNT;
use crate::depth_buffer::{DEPTH_FORMAT, DepthBuffer};
use crate::frame::{FrameClock, FrameResources};
use crate::geometry::GeometryStore;

/// Push constant block shared with the shaders.
///
/// Scalar layout: mat4 at offset 0, the vertex buffer address at 64, time
/// at 72. The trailing pad keeps the struct free of implicit padding.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct PushConstants {
    mvp: [f32; 16],
    vertex_address: u64,
    time: f32,
    _pad: u32,
}

impl PushConstants {
    const SIZE: u32 = std::mem::size_of::<Self>() as u32;
}

// Push constants are guaranteed only up to 128 bytes
const _: () = assert!(std::mem::size_of::<PushConstants>() <= 128);

/// Main renderer that manages all Vulkan resources.
pub struct Renderer {
    instance: ManuallyDrop<Instance>,
    device: Arc<Device>,
    surface: ManuallyDrop<Surface>,
    swapchain: ManuallyDrop<Swapchain>,
    depth_buffer: ManuallyDrop<DepthBuffer>,

    pipeline: ManuallyDrop<Pipeline>,
    pipeline_layout: ManuallyDrop<PipelineLayout>,
    geometry: ManuallyDrop<GeometryStore>,

    /// One entry per in-flight slot.
    frames: Vec<FrameResources>,
    /// Acquire semaphore pool, rebuilt on swapchain recreation.
    acquire_semaphores: Vec<Semaphore>,
    timeline: ManuallyDrop<TimelineSemaphore>,
    clock: FrameClock,

    timer: FrameTimer,
    /// Model rotation angle in radians, integrated from frame deltas.
    rotation: f32,
    config: RenderConfig,

    recreate_swapchain: bool,
    width: u32,
    height: u32,
}

impl Renderer {
    /// Creates a renderer for the given window.
    ///
    /// Performs the full Vulkan bring-up: instance, surface, device
    /// selection, swapchain, depth buffer, shader compilation, pipeline,
    /// geometry upload, and frame resources.
    ///
    /// # Errors
    ///
    /// Any failure here is fatal to the application; nothing is usable in
    /// a partially constructed state.
    pub fn new(window: &Window, config: RenderConfig) -> RhiResult<Self> {
        let width = window.width();
        let height = window.height();

        info!("Initializing Vulkan renderer ({}x{})", width, height);

        let instance = Instance::new(config.validation)?;

        let surface = window
            .create_surface(instance.entry(), instance.handle())
            .map_err(|e| RhiError::SwapchainError(e.to_string()))?;

        let physical_device_info = select_physical_device(
            instance.handle(),
            surface.handle(),
            surface.loader(),
            prefer_discrete,
        )?;

        let device = Device::new(&instance, &physical_device_info)?;

        let swapchain = Swapchain::new(&instance, device.clone(), surface.handle(), width, height)?;

        let depth_buffer = DepthBuffer::new(device.clone(), width, height)?;

        let (pipeline, pipeline_layout) =
            Self::create_pipeline(device.clone(), &config, swapchain.format())?;

        let model =
            Model::load(&config.model_path).map_err(|e| RhiError::InvalidHandle(e.to_string()))?;
        let geometry = GeometryStore::upload(device.clone(), &model)?;

        let graphics_family = device.queue_families().graphics_family.ok_or_else(|| {
            RhiError::InvalidHandle("selected device has no graphics family".to_string())
        })?;

        let frames = (0..crate::MAX_FRAMES_IN_FLIGHT)
            .map(|_| FrameResources::new(device.clone(), graphics_family))
            .collect::<RhiResult<Vec<_>>>()?;

        let acquire_semaphores = Self::create_acquire_semaphores(&device)?;

        let timeline =
            TimelineSemaphore::new(device.clone(), FrameClock::initial_timeline_value())?;
        let clock = FrameClock::new();

        info!(
            "Renderer initialized: {} swapchain images, {} frames in flight, {} submeshes",
            swapchain.image_count(),
            crate::MAX_FRAMES_IN_FLIGHT,
            geometry.submeshes().len()
        );

        Ok(Self {
            instance: ManuallyDrop::new(instance),
            device,
            surface: ManuallyDrop::new(surface),
            swapchain: ManuallyDrop::new(swapchain),
            depth_buffer: ManuallyDrop::new(depth_buffer),
            pipeline: ManuallyDrop::new(pipeline),
            pipeline_layout: ManuallyDrop::new(pipeline_layout),
            geometry: ManuallyDrop::new(geometry),
            frames,
            acquire_semaphores,
            timeline: ManuallyDrop::new(timeline),
            clock,
            timer: FrameTimer::new(),
            rotation: 0.0,
            config,
            recreate_swapchain: false,
            width,
            height,
        })
    }

    /// Compiles the shaders and builds the vertex-pulling pipeline.
    fn create_pipeline(
        device: Arc<Device>,
        config: &RenderConfig,
        swapchain_format: vk::Format,
    ) -> RhiResult<(Pipeline, PipelineLayout)> {
        let compiler = ShaderCompiler::new()?;

        let vertex_words =
            compiler.compile_file(&config.shader_dir.join("mesh.vert"), ShaderStage::Vertex)?;
        let fragment_words =
            compiler.compile_file(&config.shader_dir.join("mesh.frag"), ShaderStage::Fragment)?;

        let vertex_shader =
            Shader::from_spirv_words(device.clone(), &vertex_words, ShaderStage::Vertex, "main")?;
        let fragment_shader = Shader::from_spirv_words(
            device.clone(),
            &fragment_words,
            ShaderStage::Fragment,
            "main",
        )?;

        let push_constant_range = vk::PushConstantRange::default()
            .stage_flags(vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT)
            .offset(0)
            .size(PushConstants::SIZE);

        let pipeline_layout = PipelineLayout::new(device.clone(), &[push_constant_range])?;

        let pipeline = GraphicsPipelineBuilder::new()
            .vertex_shader(&vertex_shader)
            .fragment_shader(&fragment_shader)
            .color_attachment_format(swapchain_format)
            .depth_attachment_format(DEPTH_FORMAT)
            .cull_mode(CullMode::Back)
            .build(device, &pipeline_layout)?;

        Ok((pipeline, pipeline_layout))
    }

    fn create_acquire_semaphores(device: &Arc<Device>) -> RhiResult<Vec<Semaphore>> {
        (0..ACQUIRE_SEMAPHORE_COUNT)
            .map(|_| Semaphore::new(device.clone()))
            .collect()
    }

    /// Notifies the renderer that the window has been resized.
    ///
    /// The swapchain is recreated lazily at the start of the next frame.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            debug!("Ignoring resize to zero dimensions");
            return;
        }

        if width != self.width || height != self.height {
            debug!(
                "Resize requested: {}x{} -> {}x{}",
                self.width, self.height, width, height
            );
            self.width = width;
            self.height = height;
            self.recreate_swapchain = true;
        }
    }

    /// Recreates the swapchain, depth buffer, and acquire semaphore pool
    /// for the current window size.
    fn handle_recreate(&mut self) -> RhiResult<()> {
        self.device.wait_idle()?;

        self.swapchain.recreate(
            &self.instance,
            self.surface.handle(),
            self.width,
            self.height,
        )?;

        let new_depth_buffer = DepthBuffer::new(self.device.clone(), self.width, self.height)?;
        unsafe {
            ManuallyDrop::drop(&mut self.depth_buffer);
        }
        self.depth_buffer = ManuallyDrop::new(new_depth_buffer);

        // A semaphore handed to a failed acquire may still hold a pending
        // signal; a fresh pool discards that state.
        self.acquire_semaphores = Self::create_acquire_semaphores(&self.device)?;

        self.recreate_swapchain = false;
        Ok(())
    }

    /// Retires an abandoned frame's timeline value from the host.
    ///
    /// A host signal must stay below every pending GPU signal, and with
    /// multiple frames in flight the slot gate alone does not prove the
    /// previous frame retired. Waiting out all lower IDs first keeps the
    /// counter monotonic; the wait is bounded because each lower ID was
    /// either submitted or already host-signaled.
    fn retire_abandoned(&self, frame_id: u64) -> RhiResult<()> {
        self.timeline.wait(FrameClock::host_signal_gate(frame_id))?;
        self.timeline.signal(frame_id)
    }

    /// Renders one frame.
    ///
    /// A frame abandoned after its ID was issued, whether by an
    /// out-of-date acquire or a recording/submission failure, still
    /// consumes the ID; its timeline value is retired from the host so
    /// the slot's next wait completes.
    ///
    /// # Errors
    ///
    /// Returns an error for unexpected Vulkan failures. Out-of-date and
    /// suboptimal swapchains are handled internally.
    pub fn render_frame(&mut self) -> RhiResult<()> {
        if self.recreate_swapchain {
            debug!("Recreating swapchain before acquire");
            self.handle_recreate()?;
        }

        let frame_id = self.clock.advance();
        let slot = FrameClock::slot_index(frame_id);

        // Gate on the GPU having retired the frame that last used this
        // slot. The first MAX_FRAMES_IN_FLIGHT waits return immediately.
        self.timeline.wait(FrameClock::wait_target(frame_id))?;

        let acquire_semaphore =
            self.acquire_semaphores[FrameClock::acquire_index(frame_id)].handle();

        let (image_index, suboptimal) = match self.swapchain.acquire_next_image(acquire_semaphore) {
            Ok(result) => result,
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) => {
                debug!("Swapchain out of date on acquire, skipping frame {}", frame_id);
                self.recreate_swapchain = true;
                // Nothing will signal this frame's timeline value on the
                // GPU; retire it from the host so the slot stays usable.
                self.retire_abandoned(frame_id)?;
                return Ok(());
            }
            Err(e) => return Err(RhiError::VulkanError(e)),
        };

        if suboptimal {
            debug!("Swapchain suboptimal on acquire, flagging recreation");
            self.recreate_swapchain = true;
        }

        self.rotation += self.timer.delta_secs();

        // A failure here means no signal for this frame was ever queued;
        // retire its value before surfacing the error.
        if let Err(e) = self.record_commands(slot, image_index) {
            self.retire_abandoned(frame_id)?;
            return Err(e);
        }
        if let Err(e) = self.submit(slot, frame_id, acquire_semaphore) {
            self.retire_abandoned(frame_id)?;
            return Err(e);
        }

        let present_result = self.swapchain.present(
            self.device.present_queue(),
            image_index,
            self.frames[slot].render_complete(),
        );

        match present_result {
            Ok(suboptimal) => {
                if suboptimal {
                    debug!("Present returned suboptimal, flagging recreation");
                    self.recreate_swapchain = true;
                }
            }
            Err(vk::Result::ERROR_OUT_OF_DATE_KHR) | Err(vk::Result::SUBOPTIMAL_KHR) => {
                debug!("Present reported stale swapchain, flagging recreation");
                self.recreate_swapchain = true;
            }
            Err(e) => return Err(RhiError::VulkanError(e)),
        }

        Ok(())
    }

    /// Records the frame's command buffer from a freshly reset pool.
    fn record_commands(&mut self, slot: usize, image_index: u32) -> RhiResult<()> {
        let frame = &self.frames[slot];
        frame.reset_pool()?;

        let cmd = frame.command_buffer();
        let device = self.device.handle();

        unsafe {
            let begin_info = vk::CommandBufferBeginInfo::default()
                .flags(vk::CommandBufferUsageFlags::ONE_TIME_SUBMIT);
            device.begin_command_buffer(cmd, &begin_info)?;
        }

        let color_image = self.swapchain.image(image_index as usize);
        unsafe {
            transition_image_layout(
                device,
                cmd,
                color_image,
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            );
            transition_image_layout(
                device,
                cmd,
                self.depth_buffer.image(),
                vk::ImageAspectFlags::DEPTH,
                vk::ImageLayout::UNDEFINED,
                vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            );
        }

        let extent = self.swapchain.extent();
        let bundle = RenderingConfig::new(extent.width, extent.height)
            .with_color_attachment(
                ColorAttachment::new(self.swapchain.image_view(image_index as usize))
                    .with_clear_color(self.config.clear_color),
            )
            .with_depth_attachment(DepthAttachment::new(self.depth_buffer.image_view()))
            .build();

        let push_constants = self.build_push_constants(extent);

        unsafe {
            device.cmd_begin_rendering(cmd, &bundle.info());

            let viewport = vk::Viewport {
                x: 0.0,
                y: 0.0,
                width: extent.width as f32,
                height: extent.height as f32,
                min_depth: 0.0,
                max_depth: 1.0,
            };
            device.cmd_set_viewport(cmd, 0, &[viewport]);

            let scissor = vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent,
            };
            device.cmd_set_scissor(cmd, 0, &[scissor]);

            device.cmd_bind_pipeline(cmd, vk::PipelineBindPoint::GRAPHICS, self.pipeline.handle());

            device.cmd_push_constants(
                cmd,
                self.pipeline_layout.handle(),
                vk::ShaderStageFlags::VERTEX | vk::ShaderStageFlags::FRAGMENT,
                0,
                bytemuck::bytes_of(&push_constants),
            );

            device.cmd_bind_index_buffer(cmd, self.geometry.index_buffer(), 0, vk::IndexType::UINT32);

            for submesh in self.geometry.submeshes() {
                device.cmd_draw_indexed(
                    cmd,
                    submesh.index_count,
                    1,
                    submesh.index_start,
                    submesh.vertex_start as i32,
                    0,
                );
            }

            device.cmd_end_rendering(cmd);

            transition_image_layout(
                device,
                cmd,
                color_image,
                vk::ImageAspectFlags::COLOR,
                vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
                vk::ImageLayout::PRESENT_SRC_KHR,
            );

            device.end_command_buffer(cmd)?;
        }

        Ok(())
    }

    fn build_push_constants(&self, extent: vk::Extent2D) -> PushConstants {
        let time = self.timer.elapsed_secs();

        let view = Mat4::look_at_rh(self.config.camera_eye, self.config.camera_target, Vec3::Y);
        let mut projection = Mat4::perspective_rh(
            self.config.fov_y,
            self.config.aspect_ratio(extent.width, extent.height),
            self.config.z_near,
            self.config.z_far,
        );
        // Vulkan clip space has Y pointing down
        projection.y_axis.y *= -1.0;

        let model = Mat4::from_rotation_y(self.rotation);
        let mvp = projection * view * model;

        PushConstants {
            mvp: mvp.to_cols_array(),
            vertex_address: self.geometry.vertex_address(),
            time,
            _pad: 0,
        }
    }

    /// Submits the frame's command buffer in one synchronization2 call.
    ///
    /// Waits the acquire semaphore, signals the slot's render-complete
    /// binary semaphore and the timeline value `frame_id` atomically.
    fn submit(&self, slot: usize, frame_id: u64, acquire_semaphore: vk::Semaphore) -> RhiResult<()> {
        let frame = &self.frames[slot];

        let wait_infos = [vk::SemaphoreSubmitInfo::default()
            .semaphore(acquire_semaphore)
            .stage_mask(
                vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT
                    | vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS,
            )];

        let command_buffer_infos =
            [vk::CommandBufferSubmitInfo::default().command_buffer(frame.command_buffer())];

        let signal_infos = [
            vk::SemaphoreSubmitInfo::default()
                .semaphore(frame.render_complete())
                .stage_mask(vk::PipelineStageFlags2::ALL_GRAPHICS),
            vk::SemaphoreSubmitInfo::default()
                .semaphore(self.timeline.handle())
                .value(frame_id)
                .stage_mask(vk::PipelineStageFlags2::ALL_COMMANDS),
        ];

        let submit_info = vk::SubmitInfo2::default()
            .wait_semaphore_infos(&wait_infos)
            .command_buffer_infos(&command_buffer_infos)
            .signal_semaphore_infos(&signal_infos);

        unsafe { self.device.submit_graphics(&[submit_info]) }
    }

    /// Returns the current swapchain extent.
    pub fn extent(&self) -> vk::Extent2D {
        self.swapchain.extent()
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        if let Err(e) = self.device.wait_idle() {
            tracing::error!("Failed to idle device during renderer drop: {:?}", e);
        }

        self.frames.clear();
        self.acquire_semaphores.clear();

        unsafe {
            ManuallyDrop::drop(&mut self.timeline);
            ManuallyDrop::drop(&mut self.pipeline);
            ManuallyDrop::drop(&mut self.pipeline_layout);
            ManuallyDrop::drop(&mut self.geometry);
            ManuallyDrop::drop(&mut self.depth_buffer);
            ManuallyDrop::drop(&mut self.swapchain);
            ManuallyDrop::drop(&mut self.surface);
            ManuallyDrop::drop(&mut self.instance);
        }

        info!("Renderer destroyed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_constants_fit_hardware_minimum() {
        assert!(PushConstants::SIZE <= 128);
    }

    #[test]
    fn test_push_constants_scalar_offsets() {
        assert_eq!(std::mem::offset_of!(PushConstants, mvp), 0);
        assert_eq!(std::mem::offset_of!(PushConstants, vertex_address), 64);
        assert_eq!(std::mem::offset_of!(PushConstants, time), 72);
    }
}
