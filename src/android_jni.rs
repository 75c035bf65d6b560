//! JNI bindings for the Android app.
//!
//! Each public function here corresponds to a `external fun` declaration
//! in RustBridge.kt. The function names follow JNI naming conventions:
//! Java_<package>_<class>_<method> with dots replaced by underscores.
//!
//! Recorder and follower state lives in boxed handles owned by the
//! Kotlin side and passed back as `Long`. Structured values cross the
//! boundary as JSON strings; failures come back as `{"error": "..."}`.

use jni::objects::{JByteArray, JClass, JString};
use jni::sys::{jdouble, jint, jlong, jstring};
use jni::JNIEnv;
use log::{error, warn};
use serde::Serialize;
use serde_json::json;

use crate::config::{EngineConfig, QualityConfig};
use crate::fix::{FixQuality, PositionError, PositionFix};
use crate::follow::{FollowSession, FollowState, FollowUpdate, Follower, Proximity};
use crate::gpx;
use crate::recorder::Recorder;
use crate::trail::{StyleTag, Trail, Waypoint};

/// Recording state behind a `Long` handle.
pub struct RecorderHandle {
    recorder: Recorder,
    quality: QualityConfig,
}

/// Guidance state behind a `Long` handle. No session means idle.
pub struct FollowHandle {
    follower: Follower,
    session: Option<FollowSession>,
}

#[derive(Serialize)]
struct AcceptedFix<'a> {
    waypoint: Option<&'a Waypoint>,
    quality: FixQuality,
    points: usize,
}

#[derive(Serialize)]
struct GuidanceUpdate {
    #[serde(flatten)]
    update: FollowUpdate,
    #[serde(skip_serializing_if = "Option::is_none")]
    proximity: Option<Proximity>,
    state: FollowState,
}

fn error_json(message: impl std::fmt::Display) -> String {
    json!({ "error": message.to_string() }).to_string()
}

fn to_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|e| error_json(format!("JSON serialize error: {e}")))
}

/// `{"error": "...", "kind": "..."}` for a position source failure.
fn position_error_json(code: i32) -> String {
    let err = PositionError::from_code(code);
    warn!("Position source error: {err}");
    json!({ "error": err.to_string(), "kind": err }).to_string()
}

fn parse_config(json: Option<&str>) -> Result<EngineConfig, String> {
    match json.map(str::trim) {
        None | Some("") => Ok(EngineConfig::default()),
        Some(text) => EngineConfig::from_json(text).map_err(|e| e.to_string()),
    }
}

impl RecorderHandle {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            recorder: Recorder::new(config.recorder),
            quality: config.quality,
        }
    }

    pub fn set_style(&mut self, color: &str, style: &str) -> Result<(), String> {
        let style: StyleTag = serde_json::from_value(json!(style))
            .map_err(|_| format!("unknown style {style:?}"))?;
        self.recorder.set_color_tag(color);
        self.recorder.set_style_tag(style);
        Ok(())
    }

    pub fn accept_fix(&mut self, fix: &PositionFix) -> String {
        let quality = fix.quality(&self.quality);
        let waypoint = self.recorder.accept_fix(fix);
        to_json(&AcceptedFix {
            waypoint: waypoint.as_ref(),
            quality,
            points: self.recorder.len(),
        })
    }

    pub fn finalize(&mut self, name: &str) -> String {
        match self.recorder.finalize(name) {
            Ok(trail) => to_json(&trail),
            Err(e) => error_json(e),
        }
    }

    pub fn clear(&mut self) {
        self.recorder.clear();
    }
}

impl FollowHandle {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            follower: Follower::new(config.follow),
            session: None,
        }
    }

    /// Start following a trail given as JSON, replacing any session.
    pub fn start(&mut self, trail_json: &str) -> String {
        let trail: Trail = match serde_json::from_str(trail_json) {
            Ok(trail) => trail,
            Err(e) => return error_json(format!("invalid trail: {e}")),
        };
        match self.follower.start(trail) {
            Ok(session) => {
                self.session = Some(session);
                to_json(&json!({ "state": self.state() }))
            }
            Err(e) => {
                self.session = None;
                error_json(e)
            }
        }
    }

    pub fn advance(&mut self, fix: &PositionFix) -> String {
        let update = match self.session.as_mut() {
            Some(session) => self.follower.advance(session, fix),
            None => FollowUpdate::Stale,
        };
        self.describe(update)
    }

    pub fn tick(&mut self) -> String {
        let update = match self.session.as_mut() {
            Some(session) => self.follower.tick(session),
            None => FollowUpdate::Stale,
        };
        self.describe(update)
    }

    pub fn stop(&mut self) {
        if let Some(session) = self.session.as_mut() {
            self.follower.stop(session);
        }
    }

    pub fn state(&self) -> FollowState {
        self.session.as_ref().map_or(FollowState::Idle, FollowSession::state)
    }

    fn describe(&self, update: FollowUpdate) -> String {
        let proximity = match update {
            FollowUpdate::InProgress { distance_to_target_m, .. } => {
                Some(Proximity::classify(distance_to_target_m, self.follower.config()))
            }
            _ => None,
        };
        to_json(&GuidanceUpdate {
            update,
            proximity,
            state: self.state(),
        })
    }
}

fn into_handle<T>(value: T) -> jlong {
    Box::into_raw(Box::new(value)) as jlong
}

fn handle_mut<'a, T>(handle: jlong) -> Option<&'a mut T> {
    // SAFETY: non-zero handles are only created by `into_handle` for the
    // matching type and stay valid until the matching free call.
    unsafe { (handle as *mut T).as_mut() }
}

fn free_handle<T>(handle: jlong) {
    if handle != 0 {
        // SAFETY: see `handle_mut`; the Kotlin side frees each handle once.
        drop(unsafe { Box::from_raw(handle as *mut T) });
    }
}

fn read_string(env: &mut JNIEnv, value: &JString) -> Option<String> {
    if value.is_null() {
        return None;
    }
    match env.get_string(value) {
        Ok(s) => Some(s.into()),
        Err(e) => {
            error!("Failed to read Java string: {e}");
            None
        }
    }
}

fn new_jstring(env: &mut JNIEnv, value: &str) -> jstring {
    match env.new_string(value) {
        Ok(s) => s.into_raw(),
        Err(e) => {
            error!("Failed to create Java string: {e}");
            std::ptr::null_mut()
        }
    }
}

fn missing_handle(env: &mut JNIEnv) -> jstring {
    new_jstring(env, &error_json("invalid handle"))
}

/// Returns the library version.
/// Maps to: RustBridge.version() -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_luminpath_app_RustBridge_version(
    mut env: JNIEnv,
    _class: JClass,
) -> jstring {
    new_jstring(&mut env, crate::VERSION)
}

/// Sets up logging. Safe to call more than once.
/// Maps to: RustBridge.init()
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_luminpath_app_RustBridge_init(_env: JNIEnv, _class: JClass) {
    #[cfg(target_os = "android")]
    android_logger::init_once(
        android_logger::Config::default()
            .with_max_level(log::LevelFilter::Debug)
            .with_tag("LuminPath"),
    );
}

/// Maps to: RustBridge.recorderNew(configJson: String?) -> Long
/// Returns 0 when the config is invalid.
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_luminpath_app_RustBridge_recorderNew(
    mut env: JNIEnv,
    _class: JClass,
    config_json: JString,
) -> jlong {
    let config = read_string(&mut env, &config_json);
    match parse_config(config.as_deref()) {
        Ok(config) => into_handle(RecorderHandle::new(config)),
        Err(e) => {
            warn!("Rejected recorder config: {e}");
            0
        }
    }
}

/// Maps to: RustBridge.recorderSetStyle(handle: Long, color: String, style: String) -> String?
/// Returns null on success, error JSON otherwise.
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_luminpath_app_RustBridge_recorderSetStyle(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
    color: JString,
    style: JString,
) -> jstring {
    let Some(recorder) = handle_mut::<RecorderHandle>(handle) else {
        return missing_handle(&mut env);
    };
    let color = read_string(&mut env, &color).unwrap_or_default();
    let style = read_string(&mut env, &style).unwrap_or_default();
    match recorder.set_style(&color, &style) {
        Ok(()) => std::ptr::null_mut(),
        Err(e) => new_jstring(&mut env, &error_json(e)),
    }
}

/// Maps to: RustBridge.recorderAcceptFix(handle, lat, lon, accuracy, timestampMs) -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_luminpath_app_RustBridge_recorderAcceptFix(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
    lat: jdouble,
    lon: jdouble,
    accuracy: jdouble,
    timestamp_ms: jlong,
) -> jstring {
    let Some(recorder) = handle_mut::<RecorderHandle>(handle) else {
        return missing_handle(&mut env);
    };
    let result = recorder.accept_fix(&PositionFix::new(lat, lon, accuracy, timestamp_ms));
    new_jstring(&mut env, &result)
}

/// Maps to: RustBridge.recorderFinalize(handle: Long, name: String) -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_luminpath_app_RustBridge_recorderFinalize(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
    name: JString,
) -> jstring {
    let Some(recorder) = handle_mut::<RecorderHandle>(handle) else {
        return missing_handle(&mut env);
    };
    let name = read_string(&mut env, &name).unwrap_or_default();
    let result = recorder.finalize(&name);
    new_jstring(&mut env, &result)
}

/// Maps to: RustBridge.recorderClear(handle: Long)
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_luminpath_app_RustBridge_recorderClear(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) {
    if let Some(recorder) = handle_mut::<RecorderHandle>(handle) {
        recorder.clear();
    }
}

/// Maps to: RustBridge.recorderFree(handle: Long)
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_luminpath_app_RustBridge_recorderFree(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) {
    free_handle::<RecorderHandle>(handle);
}

/// Maps to: RustBridge.followNew(configJson: String?) -> Long
/// Returns 0 when the config is invalid.
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_luminpath_app_RustBridge_followNew(
    mut env: JNIEnv,
    _class: JClass,
    config_json: JString,
) -> jlong {
    let config = read_string(&mut env, &config_json);
    match parse_config(config.as_deref()) {
        Ok(config) => into_handle(FollowHandle::new(config)),
        Err(e) => {
            warn!("Rejected follow config: {e}");
            0
        }
    }
}

/// Maps to: RustBridge.followStart(handle: Long, trailJson: String) -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_luminpath_app_RustBridge_followStart(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
    trail_json: JString,
) -> jstring {
    let Some(follow) = handle_mut::<FollowHandle>(handle) else {
        return missing_handle(&mut env);
    };
    let trail_json = read_string(&mut env, &trail_json).unwrap_or_default();
    let result = follow.start(&trail_json);
    new_jstring(&mut env, &result)
}

/// Maps to: RustBridge.followAdvance(handle, lat, lon, accuracy, timestampMs) -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_luminpath_app_RustBridge_followAdvance(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
    lat: jdouble,
    lon: jdouble,
    accuracy: jdouble,
    timestamp_ms: jlong,
) -> jstring {
    let Some(follow) = handle_mut::<FollowHandle>(handle) else {
        return missing_handle(&mut env);
    };
    let result = follow.advance(&PositionFix::new(lat, lon, accuracy, timestamp_ms));
    new_jstring(&mut env, &result)
}

/// Maps to: RustBridge.followTick(handle: Long) -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_luminpath_app_RustBridge_followTick(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jstring {
    let Some(follow) = handle_mut::<FollowHandle>(handle) else {
        return missing_handle(&mut env);
    };
    let result = follow.tick();
    new_jstring(&mut env, &result)
}

/// Maps to: RustBridge.followStop(handle: Long)
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_luminpath_app_RustBridge_followStop(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) {
    if let Some(follow) = handle_mut::<FollowHandle>(handle) {
        follow.stop();
    }
}

/// Maps to: RustBridge.followState(handle: Long) -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_luminpath_app_RustBridge_followState(
    mut env: JNIEnv,
    _class: JClass,
    handle: jlong,
) -> jstring {
    let Some(follow) = handle_mut::<FollowHandle>(handle) else {
        return missing_handle(&mut env);
    };
    let state = to_json(&follow.state());
    new_jstring(&mut env, &state)
}

/// Maps to: RustBridge.followFree(handle: Long)
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_luminpath_app_RustBridge_followFree(
    _env: JNIEnv,
    _class: JClass,
    handle: jlong,
) {
    free_handle::<FollowHandle>(handle);
}

/// Reports a position source failure as error JSON. Nothing is advanced.
/// Maps to: RustBridge.positionError(code: Int) -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_luminpath_app_RustBridge_positionError(
    mut env: JNIEnv,
    _class: JClass,
    code: jint,
) -> jstring {
    let result = position_error_json(code);
    new_jstring(&mut env, &result)
}

/// Maps to: RustBridge.importGpx(data: ByteArray, fallbackName: String) -> String
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_luminpath_app_RustBridge_importGpx(
    mut env: JNIEnv,
    _class: JClass,
    data: JByteArray,
    fallback_name: JString,
) -> jstring {
    let bytes = match env.convert_byte_array(&data) {
        Ok(bytes) => bytes,
        Err(e) => return new_jstring(&mut env, &error_json(format!("failed to read GPX bytes: {e}"))),
    };
    let name = read_string(&mut env, &fallback_name).unwrap_or_default();
    let result = match gpx::trail_from_gpx_bytes(&bytes, &name, &EngineConfig::default().recorder) {
        Ok(trail) => to_json(&trail),
        Err(e) => error_json(e),
    };
    new_jstring(&mut env, &result)
}
