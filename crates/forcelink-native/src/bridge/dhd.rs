//! Force Dimension devices through the vendor `dhd` SDK.
//!
//! The SDK is loaded at runtime with `libloading`, so the binary builds and
//! runs on machines without it; only selecting `device.kind = "dhd"` requires
//! the shared library to be present. All calls address the default device
//! (ID `-1`).

use std::ffi::{c_char, c_int, c_uchar, CStr};
use std::path::Path;

use libloading::Library;
use nalgebra::{Matrix3, Vector3};

use super::device::{ButtonState, DeviceError, DeviceInfo, DeviceKind, DeviceResult, HapticDevice};

/// ID addressing the default device.
const DEFAULT_ID: c_char = -1;

/// `DHD_ON` as returned by `dhdGetButton`.
const DHD_ON: c_int = 1;

type OpenFn = unsafe extern "C" fn() -> c_int;
type CloseFn = unsafe extern "C" fn(c_char) -> c_int;
type EnableForceFn = unsafe extern "C" fn(c_uchar, c_char) -> c_int;
type GetPositionFn = unsafe extern "C" fn(*mut f64, *mut f64, *mut f64, c_char) -> c_int;
type GetOrientationFrameFn = unsafe extern "C" fn(*mut [f64; 3], c_char) -> c_int;
type SetForceFn = unsafe extern "C" fn(f64, f64, f64, c_char) -> c_int;
type SetForceAndGripperFn = unsafe extern "C" fn(f64, f64, f64, f64, c_char) -> c_int;
type GetButtonFn = unsafe extern "C" fn(c_int, c_char) -> c_int;
type HasCapabilityFn = unsafe extern "C" fn(c_char) -> bool;
type GetSystemNameFn = unsafe extern "C" fn(c_char) -> *const c_char;
type GetStrFn = unsafe extern "C" fn() -> *const c_char;

/// Entry points resolved from the SDK.
struct DhdApi {
    open: OpenFn,
    close: CloseFn,
    enable_force: EnableForceFn,
    get_position: GetPositionFn,
    get_orientation_frame: GetOrientationFrameFn,
    set_force: SetForceFn,
    set_force_and_gripper: SetForceAndGripperFn,
    get_button: GetButtonFn,
    has_wrist: HasCapabilityFn,
    has_gripper: HasCapabilityFn,
    get_system_name: GetSystemNameFn,
    get_sdk_version_str: GetStrFn,
    error_get_last_str: GetStrFn,
}

macro_rules! symbol {
    ($lib:expr, $name:literal) => {{
        // SAFETY: the signature matches the SDK header for this symbol and the
        // pointer is only used while `DhdDevice` keeps the library loaded.
        let symbol = unsafe { $lib.get(concat!($name, "\0").as_bytes()) }
            .map_err(|e| DeviceError::Library(format!("{}: {e}", $name)))?;
        *symbol
    }};
}

impl DhdApi {
    fn resolve(lib: &Library) -> DeviceResult<Self> {
        Ok(Self {
            open: symbol!(lib, "dhdOpen"),
            close: symbol!(lib, "dhdClose"),
            enable_force: symbol!(lib, "dhdEnableForce"),
            get_position: symbol!(lib, "dhdGetPosition"),
            get_orientation_frame: symbol!(lib, "dhdGetOrientationFrame"),
            set_force: symbol!(lib, "dhdSetForce"),
            set_force_and_gripper: symbol!(lib, "dhdSetForceAndGripperForce"),
            get_button: symbol!(lib, "dhdGetButton"),
            has_wrist: symbol!(lib, "dhdHasWrist"),
            has_gripper: symbol!(lib, "dhdHasGripper"),
            get_system_name: symbol!(lib, "dhdGetSystemName"),
            get_sdk_version_str: symbol!(lib, "dhdGetSDKVersionStr"),
            error_get_last_str: symbol!(lib, "dhdErrorGetLastStr"),
        })
    }
}

/// Read a NUL-terminated string owned by the SDK.
fn sdk_string(ptr: *const c_char) -> String {
    if ptr.is_null() {
        return String::new();
    }
    // SAFETY: the SDK returns pointers to static NUL-terminated strings.
    unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned()
}

/// A Force Dimension device.
pub struct DhdDevice {
    api: DhdApi,
    open: bool,
    // Must outlive every pointer in `api`
    _library: Library,
}

impl DhdDevice {
    /// Load the SDK from `path` and resolve its entry points.
    ///
    /// # Errors
    ///
    /// Returns [`DeviceError::Library`] if the library or a symbol is missing.
    pub fn load(path: &Path) -> DeviceResult<Self> {
        // SAFETY: loading runs the library's initialisers; the vendor SDK has
        // no initialisers with preconditions.
        let library = unsafe { Library::new(path) }
            .map_err(|e| DeviceError::Library(format!("{}: {e}", path.display())))?;
        let api = DhdApi::resolve(&library)?;

        tracing::debug!(path = %path.display(), "Loaded dhd SDK");

        Ok(Self {
            api,
            open: false,
            _library: library,
        })
    }

    fn last_error(&self) -> String {
        // SAFETY: no arguments; returns a static string.
        sdk_string(unsafe { (self.api.error_get_last_str)() })
    }

    fn check(&self, status: c_int, what: &'static str) -> DeviceResult<()> {
        if status < 0 {
            Err(DeviceError::Read {
                what,
                reason: self.last_error(),
            })
        } else {
            Ok(())
        }
    }
}

impl HapticDevice for DhdDevice {
    fn open(&mut self) -> DeviceResult<DeviceInfo> {
        // SAFETY: no preconditions.
        let status = unsafe { (self.api.open)() };
        if status < 0 {
            return Err(DeviceError::OpenFailed(self.last_error()));
        }
        self.open = true;
        Ok(self.info())
    }

    fn close(&mut self) -> DeviceResult<()> {
        self.ensure_open()?;
        // SAFETY: device is open.
        let status = unsafe { (self.api.close)(DEFAULT_ID) };
        self.open = false;
        if status < 0 {
            return Err(DeviceError::Write(self.last_error()));
        }
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open
    }

    fn enable_force(&mut self, enable: bool) -> DeviceResult<()> {
        self.ensure_open()?;
        // SAFETY: device is open.
        let status = unsafe { (self.api.enable_force)(c_uchar::from(enable), DEFAULT_ID) };
        if status < 0 {
            return Err(DeviceError::Write(self.last_error()));
        }
        Ok(())
    }

    fn position(&mut self) -> DeviceResult<Vector3<f64>> {
        self.ensure_open()?;
        let (mut x, mut y, mut z) = (0.0, 0.0, 0.0);
        // SAFETY: the three pointers are valid for writes for the whole call.
        let status = unsafe { (self.api.get_position)(&mut x, &mut y, &mut z, DEFAULT_ID) };
        self.check(status, "position")?;
        Ok(Vector3::new(x, y, z))
    }

    fn orientation_frame(&mut self) -> DeviceResult<Matrix3<f64>> {
        self.ensure_open()?;
        let mut rows = [[0.0_f64; 3]; 3];
        // SAFETY: `rows` is a valid `double[3][3]`.
        let status = unsafe { (self.api.get_orientation_frame)(rows.as_mut_ptr(), DEFAULT_ID) };
        self.check(status, "orientation frame")?;
        Ok(Matrix3::from_fn(|r, c| rows[r][c]))
    }

    fn set_force(&mut self, force: &Vector3<f64>) -> DeviceResult<()> {
        self.ensure_open()?;
        // SAFETY: device is open.
        let status = unsafe { (self.api.set_force)(force.x, force.y, force.z, DEFAULT_ID) };
        if status < 0 {
            return Err(DeviceError::Write(self.last_error()));
        }
        Ok(())
    }

    fn set_force_and_gripper(&mut self, force: &Vector3<f64>, gripper: f64) -> DeviceResult<()> {
        self.ensure_open()?;
        // SAFETY: device is open.
        let status = unsafe {
            (self.api.set_force_and_gripper)(force.x, force.y, force.z, gripper, DEFAULT_ID)
        };
        if status < 0 {
            return Err(DeviceError::Write(self.last_error()));
        }
        Ok(())
    }

    fn button(&mut self, index: usize) -> ButtonState {
        let Ok(index) = c_int::try_from(index) else {
            return ButtonState::Released;
        };
        if !self.open {
            return ButtonState::Released;
        }
        // SAFETY: device is open.
        ButtonState::from(unsafe { (self.api.get_button)(index, DEFAULT_ID) } == DHD_ON)
    }

    fn has_wrist(&self) -> bool {
        // SAFETY: capability queries are valid on an open device.
        self.open && unsafe { (self.api.has_wrist)(DEFAULT_ID) }
    }

    fn has_gripper(&self) -> bool {
        // SAFETY: capability queries are valid on an open device.
        self.open && unsafe { (self.api.has_gripper)(DEFAULT_ID) }
    }

    fn system_name(&self) -> String {
        if !self.open {
            return "Force Dimension (closed)".to_string();
        }
        // SAFETY: device is open.
        sdk_string(unsafe { (self.api.get_system_name)(DEFAULT_ID) })
    }

    fn sdk_version(&self) -> String {
        // SAFETY: no preconditions.
        sdk_string(unsafe { (self.api.get_sdk_version_str)() })
    }

    fn kind(&self) -> DeviceKind {
        DeviceKind::Dhd
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_library_is_library_error() {
        let result = DhdDevice::load(Path::new("/nonexistent/libdhd-missing.so"));
        assert!(matches!(result, Err(DeviceError::Library(_))));
    }

    #[test]
    fn test_sdk_string_null() {
        assert_eq!(sdk_string(std::ptr::null()), "");
    }
}
