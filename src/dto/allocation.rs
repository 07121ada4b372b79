use k8s_openapi::api::core::v1::{Service, ServicePort};
use serde::{Deserialize, Serialize};

use crate::model::key::ServiceKey;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AllocationReqDto {
    pub namespace: String,
    pub name: String,
    pub ports: Vec<ServicePort>,
}

impl AllocationReqDto {
    pub fn from_service(key: &ServiceKey, service: &Service) -> Self {
        Self {
            namespace: key.namespace.clone(),
            name: key.name.clone(),
            ports: service.spec.as_ref()
                .and_then(|spec| spec.ports.clone())
                .unwrap_or_default(),
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct AllocationResDto {
    pub ip: Vec<String>,
}

#[cfg(test)]
mod tests {
    use k8s_openapi::api::core::v1::ServiceSpec;
    use k8s_openapi::apimachinery::pkg::util::intstr::IntOrString;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_request_wire_format() {
        let service = Service {
            spec: Some(ServiceSpec {
                ports: Some(vec![ServicePort {
                    name: Some(String::from("http")),
                    port: 80,
                    protocol: Some(String::from("TCP")),
                    target_port: Some(IntOrString::Int(8080)),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };
        let req = AllocationReqDto::from_service(&ServiceKey::new("shop", "web"), &service);

        assert_eq!(serde_json::to_value(&req).unwrap(), json!({
            "namespace": "shop",
            "name": "web",
            "ports": [{"name": "http", "port": 80, "protocol": "TCP", "targetPort": 8080}],
        }));
    }

    #[test]
    fn test_request_without_ports() {
        let req = AllocationReqDto::from_service(&ServiceKey::new("shop", "web"), &Service::default());
        assert!(req.ports.is_empty());
    }
}
