use crate::{FieldDispatchTable, InterfaceError, NodeContext, NodeError, NodeImpl};
use vrml_field::FieldValue;
use vrml_field::FieldType;

pub struct WorldInfo {
    info: FieldValue,
    title: FieldValue,
}

impl Default for WorldInfo {
    fn default() -> Self {
        Self {
            info: FieldValue::MFString(Vec::new()),
            title: FieldValue::SFString(String::new()),
        }
    }
}

impl NodeImpl for WorldInfo {
    const TYPE_ID: &'static str = "WorldInfo";

    fn build_table(table: &mut FieldDispatchTable<Self>) -> Result<(), InterfaceError> {
        table.add_field(FieldType::MFString, "info", |n| &n.info, |n| &mut n.info)?;
        table.add_field(FieldType::SFString, "title", |n| &n.title, |n| &mut n.title)?;
        Ok(())
    }

    /// A titled world announces itself on the browser's output.
    fn initialize(&mut self, ctx: &mut NodeContext, _timestamp: f64) -> Result<(), NodeError> {
        let title = self.title.as_str().unwrap_or_default();
        if let (false, Some(browser)) = (title.is_empty(), ctx.browser()) {
            browser.description(title);
        }
        Ok(())
    }
}
