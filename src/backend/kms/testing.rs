//! In-memory mode-setting device for tests.
//!
//! Hands out descriptors that report back to a [`LeakCounter`] when dropped, so tests can check
//! that every fetched descriptor got released.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::io;
use std::iter::zip;
use std::rc::Rc;

use smithay::reexports::drm::control::{
    self, connector, crtc, encoder, framebuffer, plane, property, Mode, PlaneType,
    RawResourceHandle, ResourceHandle,
};
use smithay::reexports::drm::ClientCapability;

use super::device::{
    ConnectorDescriptor, CrtcMask, EncoderDescriptor, KmsDevice, PlaneDescriptor,
    PropertyDescriptor, Resources,
};
use super::types::PlaneScanout;

const ENOENT: i32 = 2;
const EIO: i32 = 5;
const EINVAL: i32 = 22;

#[derive(Debug, Default)]
pub struct LeakCounter {
    fetched: Cell<usize>,
    released: Cell<usize>,
    property_fetches: Cell<usize>,
}

impl LeakCounter {
    pub fn fetched(&self) -> usize {
        self.fetched.get()
    }

    pub fn released(&self) -> usize {
        self.released.get()
    }

    pub fn property_fetches(&self) -> usize {
        self.property_fetches.get()
    }

    pub fn outstanding(&self) -> usize {
        self.fetched() - self.released()
    }

    pub fn is_balanced(&self) -> bool {
        self.fetched() == self.released()
    }
}

/// A descriptor handed out by [`FakeDevice`].
#[derive(Debug)]
pub struct Tracked<T> {
    inner: T,
    counter: Rc<LeakCounter>,
}

impl<T> Drop for Tracked<T> {
    fn drop(&mut self) {
        self.counter.released.set(self.counter.released.get() + 1);
    }
}

#[derive(Debug, Clone)]
pub struct FakeConnector {
    handle: connector::Handle,
    interface_id: u32,
    state: connector::State,
    modes: Vec<Mode>,
    encoder: Option<encoder::Handle>,
}

#[derive(Debug, Clone, Copy)]
pub struct FakeEncoder {
    handle: encoder::Handle,
    crtc: Option<crtc::Handle>,
}

#[derive(Debug, Clone, Copy)]
pub struct FakePlane {
    handle: plane::Handle,
    possible_crtcs: CrtcMask,
}

#[derive(Debug, Clone)]
pub struct FakeProperty {
    handle: property::Handle,
    name: String,
}

type ObjectKey = (u32, u32);

fn object_key<H: ResourceHandle>(object: H) -> ObjectKey {
    (H::FFI_TYPE, raw_id(object))
}

fn raw_id<T: Into<RawResourceHandle>>(handle: T) -> u32 {
    handle.into().get()
}

#[derive(Debug)]
pub struct FakeDevice {
    next_id: u32,
    counter: Rc<LeakCounter>,

    connectors: Vec<FakeConnector>,
    encoders: Vec<FakeEncoder>,
    crtcs: Vec<crtc::Handle>,
    planes: Vec<FakePlane>,
    properties: Vec<FakeProperty>,
    object_properties: HashMap<ObjectKey, Vec<(property::Handle, property::RawValue)>>,
    framebuffers: HashMap<framebuffer::Handle, (u32, u32)>,

    type_property: property::Handle,
    fb_id_property: property::Handle,
    crtc_id_property: property::Handle,

    failing: HashSet<u32>,
    failing_properties_of: HashSet<ObjectKey>,
    fail_resources: bool,
    fail_plane_handles: bool,
    fail_client_caps: bool,
    fail_set_plane: Option<i32>,

    client_caps: RefCell<Vec<(ClientCapability, bool)>>,
    plane_handle_calls: Cell<usize>,
    scanouts: RefCell<Vec<PlaneScanout>>,
}

impl FakeDevice {
    pub fn new() -> Self {
        let mut dev = Self {
            next_id: 0,
            counter: Rc::new(LeakCounter::default()),
            connectors: Vec::new(),
            encoders: Vec::new(),
            crtcs: Vec::new(),
            planes: Vec::new(),
            properties: Vec::new(),
            object_properties: HashMap::new(),
            framebuffers: HashMap::new(),
            type_property: control::from_u32(u32::MAX).unwrap(),
            fb_id_property: control::from_u32(u32::MAX).unwrap(),
            crtc_id_property: control::from_u32(u32::MAX).unwrap(),
            failing: HashSet::new(),
            failing_properties_of: HashSet::new(),
            fail_resources: false,
            fail_plane_handles: false,
            fail_client_caps: false,
            fail_set_plane: None,
            client_caps: RefCell::new(Vec::new()),
            plane_handle_calls: Cell::new(0),
            scanouts: RefCell::new(Vec::new()),
        };

        // Same order the kernel registers plane properties in.
        dev.fb_id_property = dev.add_property("FB_ID");
        dev.crtc_id_property = dev.add_property("CRTC_ID");
        dev.type_property = dev.add_property("type");
        dev
    }

    fn next_handle<T: From<RawResourceHandle>>(&mut self) -> T {
        self.next_id += 1;
        control::from_u32(self.next_id).unwrap()
    }

    fn track<T>(&self, inner: T) -> Tracked<T> {
        self.counter.fetched.set(self.counter.fetched.get() + 1);
        Tracked {
            inner,
            counter: self.counter.clone(),
        }
    }

    fn check(&self, id: u32) -> io::Result<()> {
        if self.failing.contains(&id) {
            Err(io::Error::from_raw_os_error(ENOENT))
        } else {
            Ok(())
        }
    }

    pub fn add_property(&mut self, name: &str) -> property::Handle {
        let handle = self.next_handle();
        self.properties.push(FakeProperty {
            handle,
            name: name.to_owned(),
        });
        handle
    }

    pub fn add_crtc(&mut self) -> crtc::Handle {
        let handle = self.next_handle();
        self.crtcs.push(handle);
        handle
    }

    pub fn add_encoder(&mut self, crtc: Option<crtc::Handle>) -> encoder::Handle {
        let handle = self.next_handle();
        self.encoders.push(FakeEncoder { handle, crtc });
        handle
    }

    pub fn add_connector(
        &mut self,
        state: connector::State,
        modes: Vec<Mode>,
        encoder: Option<encoder::Handle>,
    ) -> connector::Handle {
        let handle = self.next_handle();
        self.connectors.push(FakeConnector {
            handle,
            interface_id: self.connectors.len() as u32 + 1,
            state,
            modes,
            encoder,
        });
        handle
    }

    /// Adds a plane that can drive the given CRTCs.
    pub fn add_plane(&mut self, crtcs: &[crtc::Handle], ty: Option<PlaneType>) -> plane::Handle {
        let mask = self.crtc_mask(crtcs);
        self.add_plane_with_mask(mask, ty.map(|ty| ty as u64))
    }

    pub fn add_plane_with_raw_type(&mut self, crtcs: &[crtc::Handle], ty: u64) -> plane::Handle {
        let mask = self.crtc_mask(crtcs);
        self.add_plane_with_mask(mask, Some(ty))
    }

    pub fn add_plane_with_mask(&mut self, possible_crtcs: CrtcMask, ty: Option<u64>) -> plane::Handle {
        let handle = self.next_handle();
        self.planes.push(FakePlane {
            handle,
            possible_crtcs,
        });

        let mut props = vec![(self.fb_id_property, 0), (self.crtc_id_property, 0)];
        if let Some(ty) = ty {
            props.push((self.type_property, ty));
        }
        self.object_properties.insert(object_key(handle), props);

        handle
    }

    pub fn crtc_mask(&self, crtcs: &[crtc::Handle]) -> CrtcMask {
        crtcs.iter().fold(CrtcMask::default(), |mask, crtc| {
            let idx = self.crtcs.iter().position(|c| c == crtc).unwrap();
            mask.with_index(idx)
        })
    }

    pub fn add_framebuffer(&mut self, width: u32, height: u32) -> framebuffer::Handle {
        let handle = self.next_handle();
        self.framebuffers.insert(handle, (width, height));
        handle
    }

    /// A framebuffer id the device knows nothing about.
    pub fn foreign_framebuffer(&mut self) -> framebuffer::Handle {
        self.next_handle()
    }

    pub fn fail_object<T: Into<RawResourceHandle>>(&mut self, handle: T) {
        self.failing.insert(raw_id(handle));
    }

    pub fn fail_property(&mut self, handle: property::Handle) {
        self.fail_object(handle);
    }

    pub fn fail_properties_of<H: ResourceHandle>(&mut self, object: H) {
        self.failing_properties_of.insert(object_key(object));
    }

    pub fn fail_resources(&mut self) {
        self.fail_resources = true;
    }

    pub fn fail_plane_handles(&mut self) {
        self.fail_plane_handles = true;
    }

    pub fn fail_client_caps(&mut self) {
        self.fail_client_caps = true;
    }

    pub fn fail_set_plane(&mut self, errno: i32) {
        self.fail_set_plane = Some(errno);
    }

    pub fn leak_counter(&self) -> &LeakCounter {
        &self.counter
    }

    pub fn type_property(&self) -> property::Handle {
        self.type_property
    }

    pub fn property_count<H: ResourceHandle>(&self, object: H) -> usize {
        self.object_properties
            .get(&object_key(object))
            .map_or(0, Vec::len)
    }

    pub fn client_caps(&self) -> Vec<(ClientCapability, bool)> {
        self.client_caps.borrow().clone()
    }

    pub fn plane_handle_calls(&self) -> usize {
        self.plane_handle_calls.get()
    }

    pub fn scanouts(&self) -> Vec<PlaneScanout> {
        self.scanouts.borrow().clone()
    }
}

impl KmsDevice for FakeDevice {
    type Connector = Tracked<FakeConnector>;
    type Encoder = Tracked<FakeEncoder>;
    type Plane = Tracked<FakePlane>;
    type Property = Tracked<FakeProperty>;

    fn set_client_capability(&self, cap: ClientCapability, enable: bool) -> io::Result<()> {
        self.client_caps.borrow_mut().push((cap, enable));
        if self.fail_client_caps {
            return Err(io::Error::from_raw_os_error(EINVAL));
        }
        Ok(())
    }

    fn resources(&self) -> io::Result<Resources> {
        if self.fail_resources {
            return Err(io::Error::from_raw_os_error(EIO));
        }

        Ok(Resources {
            connectors: self.connectors.iter().map(|c| c.handle).collect(),
            crtcs: self.crtcs.clone(),
        })
    }

    fn connector(&self, handle: connector::Handle) -> io::Result<Self::Connector> {
        self.check(raw_id(handle))?;
        let conn = self
            .connectors
            .iter()
            .find(|c| c.handle == handle)
            .ok_or_else(|| io::Error::from_raw_os_error(ENOENT))?;
        Ok(self.track(conn.clone()))
    }

    fn encoder(&self, handle: encoder::Handle) -> io::Result<Self::Encoder> {
        self.check(raw_id(handle))?;
        let enc = self
            .encoders
            .iter()
            .find(|e| e.handle == handle)
            .ok_or_else(|| io::Error::from_raw_os_error(ENOENT))?;
        Ok(self.track(*enc))
    }

    fn plane_handles(&self) -> io::Result<Vec<plane::Handle>> {
        self.plane_handle_calls.set(self.plane_handle_calls.get() + 1);
        if self.fail_plane_handles {
            return Err(io::Error::from_raw_os_error(EIO));
        }
        Ok(self.planes.iter().map(|p| p.handle).collect())
    }

    fn plane(&self, handle: plane::Handle) -> io::Result<Self::Plane> {
        self.check(raw_id(handle))?;
        let plane = self
            .planes
            .iter()
            .find(|p| p.handle == handle)
            .ok_or_else(|| io::Error::from_raw_os_error(ENOENT))?;
        Ok(self.track(*plane))
    }

    fn object_properties<H: ResourceHandle>(
        &self,
        object: H,
    ) -> io::Result<Vec<(property::Handle, property::RawValue)>> {
        let key = object_key(object);
        if self.failing_properties_of.contains(&key) {
            return Err(io::Error::from_raw_os_error(ENOENT));
        }
        Ok(self.object_properties.get(&key).cloned().unwrap_or_default())
    }

    fn property(&self, handle: property::Handle) -> io::Result<Self::Property> {
        self.counter
            .property_fetches
            .set(self.counter.property_fetches.get() + 1);
        self.check(raw_id(handle))?;
        let prop = self
            .properties
            .iter()
            .find(|p| p.handle == handle)
            .ok_or_else(|| io::Error::from_raw_os_error(ENOENT))?;
        Ok(self.track(prop.clone()))
    }

    fn framebuffer_size(&self, handle: framebuffer::Handle) -> io::Result<(u32, u32)> {
        self.framebuffers
            .get(&handle)
            .copied()
            .ok_or_else(|| io::Error::from_raw_os_error(ENOENT))
    }

    fn set_plane(&self, scanout: &PlaneScanout) -> io::Result<()> {
        if let Some(errno) = self.fail_set_plane {
            return Err(io::Error::from_raw_os_error(errno));
        }
        if !self.planes.iter().any(|p| p.handle == scanout.plane)
            || !self.crtcs.contains(&scanout.crtc)
        {
            return Err(io::Error::from_raw_os_error(EINVAL));
        }

        self.scanouts.borrow_mut().push(*scanout);
        Ok(())
    }
}

impl ConnectorDescriptor for Tracked<FakeConnector> {
    fn handle(&self) -> connector::Handle {
        self.inner.handle
    }

    fn interface(&self) -> connector::Interface {
        connector::Interface::HDMIA
    }

    fn interface_id(&self) -> u32 {
        self.inner.interface_id
    }

    fn state(&self) -> connector::State {
        self.inner.state
    }

    fn modes(&self) -> &[Mode] {
        &self.inner.modes
    }

    fn current_encoder(&self) -> Option<encoder::Handle> {
        self.inner.encoder
    }
}

impl EncoderDescriptor for Tracked<FakeEncoder> {
    fn handle(&self) -> encoder::Handle {
        self.inner.handle
    }

    fn crtc(&self) -> Option<crtc::Handle> {
        self.inner.crtc
    }
}

impl PlaneDescriptor for Tracked<FakePlane> {
    fn handle(&self) -> plane::Handle {
        self.inner.handle
    }

    fn possible_crtcs(&self) -> CrtcMask {
        self.inner.possible_crtcs
    }
}

impl PropertyDescriptor for Tracked<FakeProperty> {
    fn handle(&self) -> property::Handle {
        self.inner.handle
    }

    fn name(&self) -> Option<&str> {
        Some(&self.inner.name)
    }
}

/// A driver-provided mode with simple blanking and an exact refresh rate.
pub fn mode(width: u16, height: u16, refresh: u32, preferred: bool) -> Mode {
    mode_with_flags(width, height, refresh, preferred, 0)
}

pub fn mode_with_flags(width: u16, height: u16, refresh: u32, preferred: bool, flags: u32) -> Mode {
    let htotal = width + 160;
    let vtotal = height + 40;
    let clock = u32::from(htotal) * u32::from(vtotal) * refresh / 1000;

    let mut type_ = drm_ffi::DRM_MODE_TYPE_DRIVER;
    if preferred {
        type_ |= drm_ffi::DRM_MODE_TYPE_PREFERRED;
    }

    let mut name: [core::ffi::c_char; 32] = [0; 32];
    let mode_name = format!("{width}x{height}");
    for (a, b) in zip(&mut name[..31], mode_name.as_bytes()) {
        // Can be u8 on aarch64 and i8 on x86_64.
        *a = *b as _;
    }

    Mode::from(drm_ffi::drm_mode_modeinfo {
        clock,
        hdisplay: width,
        hsync_start: width + 48,
        hsync_end: width + 80,
        htotal,
        vdisplay: height,
        vsync_start: height + 3,
        vsync_end: height + 9,
        vtotal,
        vrefresh: refresh,
        flags,
        type_,
        name,
        hskew: 0,
        vscan: 0,
    })
}
