/// Callbacks the host display layer invokes on its listeners.
pub trait DisplayListener {
    fn name(&self) -> &str;

    fn refresh(&mut self) {}

    fn gfx_update(&mut self, _x: i32, _y: i32, _width: i32, _height: i32) {}

    /// The host swapped the surface backing the console.
    fn gfx_switch(&mut self) {}
}

/// Passive listener. Rendering happens in the host; the plane only scans out its framebuffer.
#[derive(Debug, Default, Clone, Copy)]
pub struct KmsListener;

impl DisplayListener for KmsListener {
    fn name(&self) -> &str {
        "kms"
    }
}
