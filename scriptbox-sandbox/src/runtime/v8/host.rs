//! Host bridge installed into every isolate
//!
//! Exposes console capture, a monotonic clock, base64, random bytes and
//! UTF-8 codecs as ops, then installs the web-style globals scripts expect
//! (`console`, `performance`, `atob`/`btoa`, `crypto`, `TextEncoder`,
//! `TextDecoder`, `Buffer`) on top of them. The `Deno` namespace is removed
//! afterwards so user code only sees the globals below.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use deno_core::{op2, Extension, JsRuntime, OpState};
use deno_error::JsErrorBox;
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::time::Instant;

/// Upper bound on a single `crypto.getRandomValues` request, matching the Web Crypto quota.
const MAX_RANDOM_BYTES: u32 = 65_536;

/// Appended once to a stream that hit its byte cap.
pub(crate) const TRUNCATION_MARKER: &str = "[output truncated]\n";

/// Output captured from `console.*`
#[derive(Debug, Default)]
pub(crate) struct ConsoleCapture {
    pub stdout: String,
    pub stderr: String,
}

/// Capped per-stream buffers behind `op_scriptbox_print`
struct ConsoleSink {
    capture: ConsoleCapture,
    max_bytes: usize,
    stdout_full: bool,
    stderr_full: bool,
}

impl ConsoleSink {
    fn new(max_bytes: usize) -> Self {
        Self {
            capture: ConsoleCapture::default(),
            max_bytes,
            stdout_full: false,
            stderr_full: false,
        }
    }

    fn print(&mut self, line: &str, is_err: bool) {
        let (buf, full) = if is_err {
            (&mut self.capture.stderr, &mut self.stderr_full)
        } else {
            (&mut self.capture.stdout, &mut self.stdout_full)
        };
        append_capped(buf, full, line, self.max_bytes);
    }
}

/// Append `line` plus a newline, keeping `buf` within `max_bytes` of text.
/// The first overflow writes what still fits and the truncation marker; later
/// lines are dropped.
fn append_capped(buf: &mut String, full: &mut bool, line: &str, max_bytes: usize) {
    if *full {
        return;
    }
    if buf.len() + line.len() < max_bytes {
        buf.push_str(line);
        buf.push('\n');
        return;
    }

    let mut cut = max_bytes.saturating_sub(buf.len()).min(line.len());
    while !line.is_char_boundary(cut) {
        cut -= 1;
    }
    buf.push_str(&line[..cut]);
    if !buf.is_empty() && !buf.ends_with('\n') {
        buf.push('\n');
    }
    buf.push_str(TRUNCATION_MARKER);
    *full = true;
}

/// Per-isolate host state: clock epoch and random source
pub(crate) struct HostState {
    epoch: Instant,
    rng: StdRng,
}

impl HostState {
    fn new() -> Self {
        Self {
            epoch: Instant::now(),
            rng: StdRng::from_entropy(),
        }
    }
}

#[op2(fast)]
fn op_scriptbox_print(state: &mut OpState, #[string] line: &str, is_err: bool) {
    state.borrow_mut::<ConsoleSink>().print(line, is_err);
}

#[op2(fast)]
fn op_scriptbox_now(state: &mut OpState) -> f64 {
    state.borrow::<HostState>().epoch.elapsed().as_secs_f64() * 1000.0
}

/// `btoa`: every code unit must fit in a byte
#[op2]
#[string]
fn op_scriptbox_btoa(#[string] data: String) -> Result<String, JsErrorBox> {
    let bytes = latin1_bytes(&data).ok_or_else(|| {
        JsErrorBox::type_error("btoa: string contains characters outside of the Latin1 range")
    })?;
    Ok(STANDARD.encode(bytes))
}

/// `atob`: returns one code unit per decoded byte
#[op2]
#[string]
fn op_scriptbox_atob(#[string] data: String) -> Result<String, JsErrorBox> {
    let cleaned: String = data.chars().filter(|c| !c.is_ascii_whitespace()).collect();
    let bytes = STANDARD
        .decode(cleaned.as_bytes())
        .map_err(|e| JsErrorBox::type_error(format!("atob: invalid base64 input: {}", e)))?;
    Ok(bytes.iter().map(|&b| char::from(b)).collect())
}

#[op2]
#[string]
fn op_scriptbox_random_b64(state: &mut OpState, len: u32) -> Result<String, JsErrorBox> {
    if len > MAX_RANDOM_BYTES {
        return Err(JsErrorBox::type_error(format!(
            "getRandomValues: requested {} bytes, limit is {}",
            len, MAX_RANDOM_BYTES
        )));
    }
    let mut buf = vec![0u8; len as usize];
    state.borrow_mut::<HostState>().rng.fill_bytes(&mut buf);
    Ok(STANDARD.encode(buf))
}

#[op2]
#[buffer]
fn op_scriptbox_encode_utf8(#[string] text: String) -> Vec<u8> {
    text.into_bytes()
}

#[op2]
#[string]
fn op_scriptbox_decode_utf8(#[buffer] bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

fn latin1_bytes(data: &str) -> Option<Vec<u8>> {
    data.chars()
        .map(|c| u8::try_from(u32::from(c)).ok())
        .collect()
}

/// Create the host extension
pub(crate) fn host_extension() -> Extension {
    let ops = vec![
        op_scriptbox_print(),
        op_scriptbox_now(),
        op_scriptbox_btoa(),
        op_scriptbox_atob(),
        op_scriptbox_random_b64(),
        op_scriptbox_encode_utf8(),
        op_scriptbox_decode_utf8(),
    ];

    Extension {
        name: "scriptbox_host",
        ops: std::borrow::Cow::Owned(ops),
        ..Default::default()
    }
}

/// Globals layered on top of the host ops
const BOOTSTRAP_JS: &str = r#"
((ops) => {
    const stringify = (value) => {
        try {
            return String(value);
        } catch {
            return Object.prototype.toString.call(value);
        }
    };
    const line = (args) => args.map(stringify).join(" ");

    globalThis.console = {
        log: (...args) => ops.op_scriptbox_print(line(args), false),
        info: (...args) => ops.op_scriptbox_print(line(args), false),
        warn: (...args) => ops.op_scriptbox_print(line(args), true),
        error: (...args) => ops.op_scriptbox_print(line(args), true),
    };

    globalThis.performance = {
        now: () => ops.op_scriptbox_now(),
    };

    globalThis.btoa = (data) => ops.op_scriptbox_btoa(String(data));
    globalThis.atob = (data) => ops.op_scriptbox_atob(String(data));

    const binaryToBytes = (binary) => {
        const out = new Uint8Array(binary.length);
        for (let i = 0; i < binary.length; i++) {
            out[i] = binary.charCodeAt(i);
        }
        return out;
    };
    const bytesToBinary = (bytes) => {
        let out = "";
        for (let i = 0; i < bytes.length; i++) {
            out += String.fromCharCode(bytes[i]);
        }
        return out;
    };
    const asBytes = (input) => {
        if (input instanceof ArrayBuffer) {
            return new Uint8Array(input);
        }
        if (ArrayBuffer.isView(input)) {
            return new Uint8Array(input.buffer, input.byteOffset, input.byteLength);
        }
        throw new TypeError("expected an ArrayBuffer or ArrayBufferView");
    };

    globalThis.crypto = {
        getRandomValues(array) {
            if (!ArrayBuffer.isView(array) || array instanceof DataView) {
                throw new TypeError("getRandomValues: argument must be an integer typed array");
            }
            const random = binaryToBytes(ops.op_scriptbox_atob(ops.op_scriptbox_random_b64(array.byteLength)));
            asBytes(array).set(random);
            return array;
        },
    };

    class TextEncoder {
        get encoding() {
            return "utf-8";
        }
        encode(input = "") {
            return ops.op_scriptbox_encode_utf8(String(input));
        }
    }

    class TextDecoder {
        get encoding() {
            return "utf-8";
        }
        decode(input) {
            if (input === undefined) {
                return "";
            }
            return ops.op_scriptbox_decode_utf8(asBytes(input));
        }
    }

    globalThis.TextEncoder = TextEncoder;
    globalThis.TextDecoder = TextDecoder;

    globalThis.Buffer = {
        from(data, encoding) {
            if (typeof data === "string") {
                switch (encoding) {
                    case "base64":
                        return binaryToBytes(ops.op_scriptbox_atob(data));
                    case "latin1":
                    case "binary":
                        return binaryToBytes(data);
                    default:
                        return ops.op_scriptbox_encode_utf8(data);
                }
            }
            if (Array.isArray(data)) {
                return Uint8Array.from(data);
            }
            return Uint8Array.from(asBytes(data));
        },
        alloc: (size) => new Uint8Array(size),
        toBase64: (bytes) => ops.op_scriptbox_btoa(bytesToBinary(asBytes(bytes))),
    };

    // Timers are not part of the sandbox surface.
    for (const name of ["setTimeout", "setInterval", "clearTimeout", "clearInterval"]) {
        delete globalThis[name];
    }
    delete globalThis.Deno;
})(Deno.core.ops);
"#;

/// Seed per-isolate state and install the globals.
pub(crate) fn install(
    runtime: &mut JsRuntime,
    max_output_bytes: usize,
) -> Result<(), deno_core::error::CoreError> {
    {
        let state = runtime.op_state();
        let mut state = state.borrow_mut();
        state.put(HostState::new());
        state.put(ConsoleSink::new(max_output_bytes));
    }
    runtime.execute_script("[scriptbox:bootstrap]", BOOTSTRAP_JS)?;
    Ok(())
}

/// Take everything the script printed so far.
pub(crate) fn take_console(runtime: &mut JsRuntime) -> ConsoleCapture {
    runtime
        .op_state()
        .borrow_mut()
        .try_take::<ConsoleSink>()
        .map(|sink| sink.capture)
        .unwrap_or_default()
}
