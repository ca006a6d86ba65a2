use super::definition::Project;
use crate::error::ConversionError;

/// A trait for custom project formats that can be converted into a `Project`.
///
/// Editors and file formats keep their own document model; implementing this
/// trait provides the translation layer into the runtime's canonical model.
///
/// # Example
///
/// ```rust,no_run
/// use nagare::prelude::*;
/// use nagare::error::ConversionError;
///
/// struct MyDocument { flows: Vec<(String, Vec<(String, String)>)> }
///
/// impl IntoProject for MyDocument {
///     fn into_project(self) -> std::result::Result<Project, ConversionError> {
///         let mut project = Project::default();
///         for (name, components) in self.flows {
///             let mut flow = FlowDefinition { name, ..Default::default() };
///             for (id, type_name) in components {
///                 let kind = match type_name.as_str() {
///                     "start" => ComponentKind::Start,
///                     "end" => ComponentKind::End,
///                     other => {
///                         return Err(ConversionError::UnknownComponentType {
///                             component: id,
///                             type_name: other.to_string(),
///                         })
///                     }
///                 };
///                 flow.components.push(ComponentDefinition::new(id, kind));
///             }
///             project.flows.push(flow);
///         }
///         Ok(project)
///     }
/// }
/// ```
pub trait IntoProject {
    /// Consumes the object and converts it into a runnable project.
    fn into_project(self) -> Result<Project, ConversionError>;
}

impl IntoProject for Project {
    fn into_project(self) -> Result<Project, ConversionError> {
        Ok(self)
    }
}
