//! Accessors over the Kubernetes pod fields the engine reads

use chrono::{DateTime, Utc};
use k8s_openapi::api::core::v1::{Container, Pod, ResourceRequirements};
use k8s_openapi::apimachinery::pkg::api::resource::Quantity;

use crate::units::{CpuQuantity, QuantityParseError};

pub const CPU: &str = "cpu";

/// Which side of a container's resources a value belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceField {
    Requests,
    Limits,
}

impl ResourceField {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResourceField::Requests => "requests",
            ResourceField::Limits => "limits",
        }
    }
}

pub fn pod_name(pod: &Pod) -> &str {
    pod.metadata.name.as_deref().unwrap_or_default()
}

pub fn pod_namespace(pod: &Pod) -> &str {
    pod.metadata.namespace.as_deref().unwrap_or_default()
}

pub fn creation_timestamp(pod: &Pod) -> Option<DateTime<Utc>> {
    pod.metadata.creation_timestamp.as_ref().map(|t| t.0)
}

pub fn containers(pod: &Pod) -> &[Container] {
    pod.spec
        .as_ref()
        .map(|spec| spec.containers.as_slice())
        .unwrap_or_default()
}

/// Image of the first regular container, empty when absent
pub fn first_container_image(pod: &Pod) -> &str {
    containers(pod)
        .first()
        .and_then(|c| c.image.as_deref())
        .unwrap_or_default()
}

pub fn container_image(container: &Container) -> &str {
    container.image.as_deref().unwrap_or_default()
}

/// True when the pod status lists a condition with the given type and status
pub fn has_condition(pod: &Pod, condition_type: &str, status: &str) -> bool {
    pod.status
        .as_ref()
        .and_then(|s| s.conditions.as_ref())
        .map(|conditions| {
            conditions
                .iter()
                .any(|c| c.type_ == condition_type && c.status == status)
        })
        .unwrap_or(false)
}

fn field_map(
    resources: &ResourceRequirements,
    field: ResourceField,
) -> Option<&std::collections::BTreeMap<String, Quantity>> {
    match field {
        ResourceField::Requests => resources.requests.as_ref(),
        ResourceField::Limits => resources.limits.as_ref(),
    }
}

/// Current CPU value of a resource field; `Ok(None)` when unset
pub fn cpu_of(
    resources: &ResourceRequirements,
    field: ResourceField,
) -> Result<Option<CpuQuantity>, QuantityParseError> {
    field_map(resources, field)
        .and_then(|m| m.get(CPU))
        .map(|q| CpuQuantity::parse(&q.0))
        .transpose()
}

/// Raw CPU quantity string of a resource field, as stored on the pod
pub fn raw_cpu_of(resources: &ResourceRequirements, field: ResourceField) -> Option<&Quantity> {
    field_map(resources, field).and_then(|m| m.get(CPU))
}

pub fn set_cpu(resources: &mut ResourceRequirements, field: ResourceField, value: Quantity) {
    let map = match field {
        ResourceField::Requests => resources.requests.get_or_insert_with(Default::default),
        ResourceField::Limits => resources.limits.get_or_insert_with(Default::default),
    };
    map.insert(CPU.to_string(), value);
}


#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn test_has_condition_requires_type_and_status() {
        let p = with_condition(pod("web", vec![]), "Ready", "False");
        assert!(!has_condition(&p, "Ready", "True"));
        assert!(has_condition(&p, "Ready", "False"));
        assert!(!has_condition(&pod("web", vec![]), "Ready", "True"));
    }

    #[test]
    fn test_cpu_accessors() {
        let c = container("app", "nginx", Some("500m"), None);
        let resources = c.resources.as_ref().unwrap();
        assert_eq!(
            cpu_of(resources, ResourceField::Requests).unwrap(),
            Some(CpuQuantity::from_millis(500))
        );
        assert_eq!(cpu_of(resources, ResourceField::Limits).unwrap(), None);
    }

    #[test]
    fn test_first_container_image() {
        let p = pod(
            "web",
            vec![
                container("a", "first:1", None, None),
                container("b", "second:1", None, None),
            ],
        );
        assert_eq!(first_container_image(&p), "first:1");
        assert_eq!(first_container_image(&pod("empty", vec![])), "");
    }
}
