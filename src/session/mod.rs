//! Driver sessions.
//!
//! A [`Session`] binds the transport, the request correlator and the
//! page tracker to one browser target and exposes the operations a
//! driver performs on it.
//!
//! | Module       | Responsibility                                    |
//! |--------------|---------------------------------------------------|
//! | `core`       | Session struct, command sending, the frame pump   |
//! | `navigation` | Visit, reload, load waiting, response inspection  |
//! | `eval`       | Script evaluation and remote-object decoding      |
//! | `value`      | Decoded script values                             |
//! | `cookies`    | Cookie access and extra request headers           |
//! | `input`      | Synthetic keyboard and mouse input                |
//! | `capture`    | Screenshots, PDF, emulation, file inputs          |

mod capture;
mod cookies;
mod core;
mod eval;
mod input;
mod navigation;
mod value;

pub use self::cookies::Cookie;
pub use self::core::Session;
pub use self::value::ScriptValue;
