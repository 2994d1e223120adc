//! Dynamic rendering helpers (Vulkan 1.3).
//!
//! Frames render directly into swapchain image views without VkRenderPass
//! objects. [`RenderingConfig`] assembles the VkRenderingInfo for a frame and
//! [`transition_image_layout`] records the synchronization2 barriers that
//! move images between layouts.

use ash::vk;

/// Configuration for a color attachment in dynamic rendering.
///
/// Defaults to `COLOR_ATTACHMENT_OPTIMAL` layout, clear on load, store on
/// end, black clear color.
#[derive(Clone)]
pub struct ColorAttachment {
    /// The image view to render to.
    pub image_view: vk::ImageView,
    /// The image layout during rendering.
    pub layout: vk::ImageLayout,
    /// How to load the attachment contents at the start of rendering.
    pub load_op: vk::AttachmentLoadOp,
    /// How to store the attachment contents at the end of rendering.
    pub store_op: vk::AttachmentStoreOp,
    /// Clear value when load_op is CLEAR.
    pub clear_value: vk::ClearColorValue,
}

impl ColorAttachment {
    /// Creates a color attachment with default settings.
    pub fn new(image_view: vk::ImageView) -> Self {
        Self {
            image_view,
            layout: vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::STORE,
            clear_value: vk::ClearColorValue {
                float32: [0.0, 0.0, 0.0, 1.0],
            },
        }
    }

    /// Sets the clear color.
    pub fn with_clear_color(mut self, color: [f32; 4]) -> Self {
        self.clear_value = vk::ClearColorValue { float32: color };
        self
    }

    fn to_vk(&self) -> vk::RenderingAttachmentInfo<'static> {
        vk::RenderingAttachmentInfo::default()
            .image_view(self.image_view)
            .image_layout(self.layout)
            .load_op(self.load_op)
            .store_op(self.store_op)
            .clear_value(vk::ClearValue {
                color: self.clear_value,
            })
    }
}

/// Configuration for a depth attachment in dynamic rendering.
///
/// Defaults to `DEPTH_ATTACHMENT_OPTIMAL` layout, clear on load to 1.0,
/// contents discarded at the end of the pass.
#[derive(Clone)]
pub struct DepthAttachment {
    /// The depth image view.
    pub image_view: vk::ImageView,
    /// The image layout during rendering.
    pub layout: vk::ImageLayout,
    /// How to load the attachment contents at the start of rendering.
    pub load_op: vk::AttachmentLoadOp,
    /// How to store the attachment contents at the end of rendering.
    pub store_op: vk::AttachmentStoreOp,
    /// Clear depth value when load_op is CLEAR.
    pub clear_depth: f32,
}

impl DepthAttachment {
    /// Creates a depth attachment with default settings.
    pub fn new(image_view: vk::ImageView) -> Self {
        Self {
            image_view,
            layout: vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL,
            load_op: vk::AttachmentLoadOp::CLEAR,
            store_op: vk::AttachmentStoreOp::DONT_CARE,
            clear_depth: 1.0,
        }
    }

    /// Sets the depth clear value.
    pub fn with_clear_depth(mut self, depth: f32) -> Self {
        self.clear_depth = depth;
        self
    }

    fn to_vk(&self) -> vk::RenderingAttachmentInfo<'static> {
        vk::RenderingAttachmentInfo::default()
            .image_view(self.image_view)
            .image_layout(self.layout)
            .load_op(self.load_op)
            .store_op(self.store_op)
            .clear_value(vk::ClearValue {
                depth_stencil: vk::ClearDepthStencilValue {
                    depth: self.clear_depth,
                    stencil: 0,
                },
            })
    }
}

/// Complete rendering configuration for one pass.
pub struct RenderingConfig {
    width: u32,
    height: u32,
    color_attachments: Vec<ColorAttachment>,
    depth_attachment: Option<DepthAttachment>,
}

impl RenderingConfig {
    /// Creates a rendering configuration for the given render area.
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            color_attachments: Vec::new(),
            depth_attachment: None,
        }
    }

    /// Adds a color attachment.
    pub fn with_color_attachment(mut self, attachment: ColorAttachment) -> Self {
        self.color_attachments.push(attachment);
        self
    }

    /// Sets the depth attachment.
    pub fn with_depth_attachment(mut self, attachment: DepthAttachment) -> Self {
        self.depth_attachment = Some(attachment);
        self
    }

    /// Builds the rendering info bundle.
    ///
    /// The bundle owns the attachment info arrays that VkRenderingInfo
    /// points into, so it must outlive the `cmd_begin_rendering` call.
    pub fn build(&self) -> RenderingInfoBundle {
        let color_infos: Vec<vk::RenderingAttachmentInfo<'static>> =
            self.color_attachments.iter().map(|a| a.to_vk()).collect();
        let depth_info = self.depth_attachment.as_ref().map(|a| a.to_vk());

        RenderingInfoBundle {
            render_area: vk::Rect2D {
                offset: vk::Offset2D { x: 0, y: 0 },
                extent: vk::Extent2D {
                    width: self.width,
                    height: self.height,
                },
            },
            color_infos,
            depth_info,
        }
    }
}

/// Owns the attachment arrays backing a VkRenderingInfo.
pub struct RenderingInfoBundle {
    render_area: vk::Rect2D,
    color_infos: Vec<vk::RenderingAttachmentInfo<'static>>,
    depth_info: Option<vk::RenderingAttachmentInfo<'static>>,
}

impl RenderingInfoBundle {
    /// Returns the VkRenderingInfo borrowing this bundle's arrays.
    pub fn info(&self) -> vk::RenderingInfo<'_> {
        let mut info = vk::RenderingInfo::default()
            .render_area(self.render_area)
            .layer_count(1)
            .color_attachments(&self.color_infos);

        if let Some(depth) = &self.depth_info {
            info = info.depth_attachment(depth);
        }

        info
    }

    /// Returns the render area.
    #[inline]
    pub fn render_area(&self) -> vk::Rect2D {
        self.render_area
    }
}

/// Records an image layout transition using synchronization2.
///
/// Stage and access masks are derived from the pair of layouts. Only the
/// transitions this renderer needs are covered.
///
/// # Safety
///
/// `command_buffer` must be in the recording state and `image` must be a
/// valid image whose current layout matches `old_layout`.
pub unsafe fn transition_image_layout(
    device: &ash::Device,
    command_buffer: vk::CommandBuffer,
    image: vk::Image,
    aspect_mask: vk::ImageAspectFlags,
    old_layout: vk::ImageLayout,
    new_layout: vk::ImageLayout,
) {
    let (src_stage, src_access) = match old_layout {
        vk::ImageLayout::UNDEFINED => (vk::PipelineStageFlags2::TOP_OF_PIPE, vk::AccessFlags2::NONE),
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => (
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        ),
        _ => (
            vk::PipelineStageFlags2::ALL_COMMANDS,
            vk::AccessFlags2::MEMORY_WRITE,
        ),
    };

    let (dst_stage, dst_access) = match new_layout {
        vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL => (
            vk::PipelineStageFlags2::COLOR_ATTACHMENT_OUTPUT,
            vk::AccessFlags2::COLOR_ATTACHMENT_WRITE,
        ),
        vk::ImageLayout::DEPTH_ATTACHMENT_OPTIMAL => (
            vk::PipelineStageFlags2::EARLY_FRAGMENT_TESTS
                | vk::PipelineStageFlags2::LATE_FRAGMENT_TESTS,
            vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_READ
                | vk::AccessFlags2::DEPTH_STENCIL_ATTACHMENT_WRITE,
        ),
        vk::ImageLayout::PRESENT_SRC_KHR => {
            (vk::PipelineStageFlags2::BOTTOM_OF_PIPE, vk::AccessFlags2::NONE)
        }
        _ => (
            vk::PipelineStageFlags2::ALL_COMMANDS,
            vk::AccessFlags2::MEMORY_READ | vk::AccessFlags2::MEMORY_WRITE,
        ),
    };

    let barrier = vk::ImageMemoryBarrier2::default()
        .src_stage_mask(src_stage)
        .src_access_mask(src_access)
        .dst_stage_mask(dst_stage)
        .dst_access_mask(dst_access)
        .old_layout(old_layout)
        .new_layout(new_layout)
        .src_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .dst_queue_family_index(vk::QUEUE_FAMILY_IGNORED)
        .image(image)
        .subresource_range(vk::ImageSubresourceRange {
            aspect_mask,
            base_mip_level: 0,
            level_count: 1,
            base_array_layer: 0,
            layer_count: 1,
        });

    let barriers = [barrier];
    let dependency_info = vk::DependencyInfo::default().image_memory_barriers(&barriers);

    unsafe {
        device.cmd_pipeline_barrier2(command_buffer, &dependency_info);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rendering_config_render_area() {
        let config = RenderingConfig::new(1280, 720);
        let bundle = config.build();
        assert_eq!(bundle.render_area().extent.width, 1280);
        assert_eq!(bundle.render_area().extent.height, 720);
        assert_eq!(bundle.render_area().offset.x, 0);
    }

    #[test]
    fn test_color_attachment_defaults() {
        let attachment = ColorAttachment::new(vk::ImageView::null());
        assert_eq!(attachment.layout, vk::ImageLayout::COLOR_ATTACHMENT_OPTIMAL);
        assert_eq!(attachment.load_op, vk::AttachmentLoadOp::CLEAR);
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::STORE);
    }

    #[test]
    fn test_depth_attachment_clear_value() {
        let attachment = DepthAttachment::new(vk::ImageView::null()).with_clear_depth(0.5);
        assert_eq!(attachment.clear_depth, 0.5);
        assert_eq!(attachment.store_op, vk::AttachmentStoreOp::DONT_CARE);
    }
}
