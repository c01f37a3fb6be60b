use log::LevelFilter;

use serde_json::Value;

use crate::controller::{Behavior, Scope};
use crate::item::ROOT_CONTEXT;
use crate::message::{Object, value_to_switch};

const REPORT_KEY: &str = "report";
const DEBUG_KEY: &str = "debug";

/// Node-level commands.
///
/// - `{"report": ...}` publishes the node state at the end of the current
///   scheduler pass.
/// - `{"debug": "on"}` raises the log level to debug, any other value
///   restores the info level.
///
/// The host item has no update logic, so its configuration never starts
/// it. Commands are handled regardless.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Host;

impl Behavior for Host {
    const TAG: &'static str = "HOST";
    const NAME: &'static str = "Host Controller";

    fn configure(&mut self, _scope: &mut Scope<'_, '_>, _config: &Object) -> bool {
        false
    }

    fn command_element(
        &mut self,
        scope: &mut Scope<'_, '_>,
        context: &str,
        key: &str,
        value: &Value,
    ) {
        if context != ROOT_CONTEXT {
            return;
        }
        match key {
            REPORT_KEY => scope.bus().request_report(),
            DEBUG_KEY => {
                let debug = value_to_switch(value).unwrap_or(false);
                log::set_max_level(if debug {
                    LevelFilter::Debug
                } else {
                    LevelFilter::Info
                });
                scope.log(if debug {
                    "Debug logging enabled"
                } else {
                    "Debug logging disabled"
                });
            }
            _ => {}
        }
    }
}
