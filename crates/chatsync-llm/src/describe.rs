use crate::request::Schema;

/// Trait for types that can describe their shape as a [`Schema`].
///
/// Tool inputs implement this so the model knows what JSON to produce.
///
/// # Example
///
/// ```
/// use chatsync_llm::{Describe, Property, Schema};
///
/// struct RenameInput {
///     name: String,
/// }
///
/// impl Describe for RenameInput {
///     fn describe() -> Schema {
///         Schema::Object {
///             description: Some("Rename the document".into()),
///             properties: vec![Property {
///                 name: "name".into(),
///                 schema: Schema::String { description: Some("New name".into()) },
///             }],
///             required: vec!["name".into()],
///         }
///     }
/// }
/// ```
pub trait Describe {
    /// Return a [`Schema`] describing this type's structure.
    fn describe() -> Schema;
}
