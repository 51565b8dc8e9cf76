use super::emit;
use crate::{Bindable, EventEmitter, NodeContext};
use vrml_field::FieldValue;

/// Handle `set_bind` for a bindable node. Binding replaces whatever was
/// bound, which is told `set_bind FALSE`; unbinding leaves nothing bound.
pub(super) fn set_bind(
    kind: Bindable,
    value: &FieldValue,
    timestamp: f64,
    ctx: &mut NodeContext,
    is_bound: &mut EventEmitter,
    bind_time: Option<&mut EventEmitter>,
) {
    let Some(browser) = ctx.browser() else {
        return;
    };
    let node = ctx.node_id();
    if value.as_bool() == Some(true) {
        let previous = browser.swap_bound(kind, Some(node));
        if previous == Some(node) {
            return;
        }
        if let Some(previous) = previous {
            ctx.defer(previous, "set_bind", FieldValue::SFBool(false));
        }
        emit(is_bound, true);
        if let Some(bind_time) = bind_time {
            emit(bind_time, timestamp);
        }
        log::debug!("bound {kind:?} {node}");
    } else {
        if browser.bound(kind) == Some(node) {
            browser.swap_bound(kind, None);
        }
        if is_bound.value().as_bool() == Some(true) {
            emit(is_bound, false);
        }
    }
    browser.set_modified();
}
