//! GLFW windowing layer
//!
//! The only window functionality the renderer needs: a Vulkan-capable
//! window, event draining, and surface creation.

use thiserror::Error;

/// Window management errors
#[derive(Error, Debug)]
pub enum WindowError {
    /// The GLFW library failed to initialize
    #[error("GLFW initialization failed")]
    InitializationFailed,

    /// The window could not be created
    #[error("window creation failed")]
    CreationFailed,

    /// Any other GLFW-reported error
    #[error("GLFW error: {0}")]
    GlfwError(String),
}

/// Result type for window operations
pub type WindowResult<T> = Result<T, WindowError>;

/// GLFW window wrapper with proper resource management
pub struct Window {
    glfw: glfw::Glfw,
    window: glfw::PWindow,
    events: glfw::GlfwReceiver<(f64, glfw::WindowEvent)>,
}

impl Window {
    /// Create a window configured for Vulkan rendering (no client API)
    pub fn new(title: &str, width: u32, height: u32) -> WindowResult<Self> {
        let mut glfw = glfw::init(glfw::fail_on_errors)
            .map_err(|_| WindowError::InitializationFailed)?;

        // Configure for Vulkan (no OpenGL context)
        glfw.window_hint(glfw::WindowHint::ClientApi(glfw::ClientApiHint::NoApi));
        glfw.window_hint(glfw::WindowHint::Resizable(false));

        let (mut window, events) = glfw
            .create_window(width, height, title, glfw::WindowMode::Windowed)
            .ok_or(WindowError::CreationFailed)?;

        window.set_key_polling(true);
        window.set_close_polling(true);

        Ok(Self {
            glfw,
            window,
            events,
        })
    }

    /// Whether the user has requested the window to close
    pub fn should_close(&self) -> bool {
        self.window.should_close()
    }

    /// Request the window to close
    pub fn set_should_close(&mut self, should_close: bool) {
        self.window.set_should_close(should_close);
    }

    /// Poll the window system and drain all pending events
    pub fn drain_events(&mut self) -> Vec<(f64, glfw::WindowEvent)> {
        self.glfw.poll_events();
        glfw::flush_messages(&self.events).collect()
    }

    /// Framebuffer size in pixels
    pub fn get_framebuffer_size(&self) -> (u32, u32) {
        let (width, height) = self.window.get_framebuffer_size();
        (width as u32, height as u32)
    }

    /// Instance extensions GLFW needs for surface creation
    pub fn get_required_instance_extensions(&self) -> WindowResult<Vec<String>> {
        self.glfw
            .get_required_instance_extensions()
            .ok_or_else(|| {
                WindowError::GlfwError("no Vulkan instance extensions reported".to_string())
            })
    }

    /// Create a Vulkan surface for this window through GLFW
    pub fn create_vulkan_surface(
        &mut self,
        instance: ash::vk::Instance,
    ) -> WindowResult<ash::vk::SurfaceKHR> {
        let mut surface = ash::vk::SurfaceKHR::null();
        let result = self
            .window
            .create_window_surface(instance, std::ptr::null(), &mut surface);

        if result == ash::vk::Result::SUCCESS {
            Ok(surface)
        } else {
            Err(WindowError::GlfwError(format!(
                "surface creation failed: {:?}",
                result
            )))
        }
    }
}
