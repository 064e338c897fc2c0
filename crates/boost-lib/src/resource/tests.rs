//! Tests for container resource policies

use super::*;
use crate::config::{AutoPolicy as AutoPolicySpec, FixedResources, PercentageIncrease};
use crate::pod::fixtures::{container, cpu};
use mockito::Matcher;
use std::time::Duration;

fn logger() -> BoostLogger {
    BoostLogger::new("boost-001", "demo")
}

fn fast_client_config() -> PredictionClientConfig {
    PredictionClientConfig {
        max_retries: 0,
        initial_backoff: Duration::from_millis(1),
        max_backoff: Duration::from_millis(1),
        ..PredictionClientConfig::default()
    }
}

fn spec(name: &str) -> ContainerPolicySpec {
    ContainerPolicySpec {
        container_name: name.to_string(),
        percentage_increase: None,
        fixed_resources: None,
        auto_policy: None,
    }
}

fn build(spec: &ContainerPolicySpec) -> Result<Arc<dyn ContainerPolicy>, ConfigError> {
    from_spec(spec, &fast_client_config(), &logger(), &BoostMetrics::new())
}

mod builder_tests {
    use super::*;

    #[test]
    fn test_percentage_settings() {
        let mut s = spec("container-one");
        s.percentage_increase = Some(PercentageIncrease { value: 120 });

        let policy = build(&s).unwrap();
        assert_eq!(policy.settings(), ResourcePolicySettings::Percentage { value: 120 });
    }

    #[test]
    fn test_fixed_settings() {
        let mut s = spec("container-two");
        s.fixed_resources = Some(FixedResources {
            requests: "1".to_string(),
            limits: "2".to_string(),
        });

        let policy = build(&s).unwrap();
        assert_eq!(
            policy.settings(),
            ResourcePolicySettings::Fixed {
                requests: CpuQuantity::from_cores(1),
                limits: CpuQuantity::from_cores(2),
            }
        );
    }

    #[test]
    fn test_missing_policy_is_rejected() {
        let err = build(&spec("container-one")).unwrap_err();
        assert!(matches!(err, ConfigError::MissingResourcePolicy { container } if container == "container-one"));
    }

    #[test]
    fn test_multiple_policies_are_rejected() {
        let mut s = spec("app");
        s.percentage_increase = Some(PercentageIncrease { value: 50 });
        s.fixed_resources = Some(FixedResources {
            requests: "1".to_string(),
            limits: "2".to_string(),
        });

        assert!(matches!(
            build(&s),
            Err(ConfigError::MultipleResourcePolicies { .. })
        ));
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let mut s = spec("app");
        s.percentage_increase = Some(PercentageIncrease { value: 0 });
        assert!(matches!(
            build(&s),
            Err(ConfigError::InvalidPercentage { value: 0, .. })
        ));

        let mut s = spec("app");
        s.percentage_increase = Some(PercentageIncrease {
            value: i64::MAX - 10,
        });
        assert!(matches!(
            build(&s),
            Err(ConfigError::InvalidPercentage { .. })
        ));

        let mut s = spec("app");
        s.percentage_increase = Some(PercentageIncrease {
            value: MAX_PERCENTAGE_INCREASE,
        });
        assert!(build(&s).is_ok());

        let mut s = spec("app");
        s.fixed_resources = Some(FixedResources {
            requests: "one".to_string(),
            limits: "2".to_string(),
        });
        assert!(matches!(build(&s), Err(ConfigError::InvalidQuantity { .. })));

        let mut s = spec("app");
        s.auto_policy = Some(AutoPolicySpec {
            api_endpoint: "not a url".to_string(),
        });
        assert!(matches!(build(&s), Err(ConfigError::InvalidEndpoint { .. })));

        assert!(matches!(build(&spec("")), Err(ConfigError::EmptyContainerName)));
    }
}

mod percentage_tests {
    use super::*;

    #[tokio::test]
    async fn test_large_percentage_saturates() {
        let policy = PercentagePolicy::new(MAX_PERCENTAGE_INCREASE, logger());
        let c = container("app", "nginx", Some("1"), Some("2"));

        let resources = policy.new_resources(&c).await.unwrap();
        let boosted = Container {
            resources: Some(resources),
            ..c
        };

        assert_eq!(cpu(&boosted, ResourceField::Requests).as_deref(), Some("101"));
        assert_eq!(cpu(&boosted, ResourceField::Limits).as_deref(), Some("202"));

        let huge = PercentagePolicy::new(i64::MAX - 10, logger());
        let c = container("app", "nginx", Some("1"), None);
        assert!(huge.new_resources(&c).await.is_some());
    }

    #[tokio::test]
    async fn test_increases_requests_and_limits() {
        let policy = PercentagePolicy::new(120, logger());
        let c = container("app", "nginx", Some("1"), Some("500m"));

        let resources = policy.new_resources(&c).await.unwrap();
        let boosted = Container {
            resources: Some(resources),
            ..c
        };

        assert_eq!(cpu(&boosted, ResourceField::Requests).as_deref(), Some("2200m"));
        assert_eq!(cpu(&boosted, ResourceField::Limits).as_deref(), Some("1100m"));
    }

    #[tokio::test]
    async fn test_unset_fields_stay_unset() {
        let policy = PercentagePolicy::new(50, logger());
        let c = container("app", "nginx", Some("2"), None);

        let resources = policy.new_resources(&c).await.unwrap();
        let boosted = Container {
            resources: Some(resources),
            ..c
        };

        assert_eq!(cpu(&boosted, ResourceField::Requests).as_deref(), Some("3"));
        assert_eq!(cpu(&boosted, ResourceField::Limits), None);
    }

    #[tokio::test]
    async fn test_tiny_values_are_kept() {
        // 1m raised by 10% floors back to 1m
        let policy = PercentagePolicy::new(10, logger());
        let c = container("app", "nginx", Some("1m"), None);

        let resources = policy.new_resources(&c).await.unwrap();
        let boosted = Container {
            resources: Some(resources),
            ..c
        };

        assert_eq!(cpu(&boosted, ResourceField::Requests).as_deref(), Some("1m"));
    }
}

mod fixed_tests {
    use super::*;

    #[tokio::test]
    async fn test_applies_configured_values() {
        let policy = FixedPolicy::new(
            CpuQuantity::from_cores(1),
            CpuQuantity::from_cores(2),
            logger(),
        );
        let c = container("app", "nginx", Some("250m"), Some("500m"));

        let resources = policy.new_resources(&c).await.unwrap();
        let boosted = Container {
            resources: Some(resources),
            ..c
        };

        assert_eq!(cpu(&boosted, ResourceField::Requests).as_deref(), Some("1"));
        assert_eq!(cpu(&boosted, ResourceField::Limits).as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_never_lowers_current_values() {
        let policy = FixedPolicy::new(
            CpuQuantity::from_cores(1),
            CpuQuantity::from_cores(2),
            logger(),
        );
        let c = container("app", "nginx", Some("1"), Some("4"));

        let resources = policy.new_resources(&c).await.unwrap();
        let boosted = Container {
            resources: Some(resources),
            ..c
        };

        assert_eq!(cpu(&boosted, ResourceField::Requests).as_deref(), Some("1"));
        assert_eq!(cpu(&boosted, ResourceField::Limits).as_deref(), Some("4"));
    }
}

mod auto_tests {
    use super::*;

    fn auto_policy(endpoint: &str) -> AutoPolicy {
        let client = PredictionClient::new(endpoint, fast_client_config()).unwrap();
        AutoPolicy::new(client, logger(), BoostMetrics::new())
    }

    #[tokio::test]
    async fn test_applies_prediction_without_lowering() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/cpu")
            .match_query(Matcher::UrlEncoded("imageName".into(), "app:v1".into()))
            .with_status(200)
            .with_body(r#"{"cpuRequests":"1500m","cpuLimits":"2"}"#)
            .create_async()
            .await;

        let policy = auto_policy(&server.url());
        let c = container("app", "app:v1", Some("500m"), Some("3"));

        let resources = policy.new_resources(&c).await.unwrap();
        let boosted = Container {
            resources: Some(resources),
            ..c
        };

        assert_eq!(cpu(&boosted, ResourceField::Requests).as_deref(), Some("1500m"));
        assert_eq!(cpu(&boosted, ResourceField::Limits).as_deref(), Some("3"));
    }

    #[tokio::test]
    async fn test_failures_yield_no_change() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("GET", "/cpu")
            .match_query(Matcher::UrlEncoded("imageName".into(), "broken:v1".into()))
            .with_status(500)
            .create_async()
            .await;
        server
            .mock("GET", "/cpu")
            .match_query(Matcher::UrlEncoded("imageName".into(), "garbage:v1".into()))
            .with_status(200)
            .with_body(r#"{"cpuRequests":"lots","cpuLimits":"2"}"#)
            .create_async()
            .await;

        let policy = auto_policy(&server.url());

        let c = container("app", "broken:v1", Some("1"), Some("2"));
        assert!(policy.new_resources(&c).await.is_none());

        let c = container("app", "garbage:v1", Some("1"), Some("2"));
        assert!(policy.new_resources(&c).await.is_none());

        let c = container("app", "", Some("1"), Some("2"));
        assert!(policy.new_resources(&c).await.is_none());

        assert!(policy.cache().is_empty());
    }

    #[tokio::test]
    async fn test_prediction_is_cached_per_image() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/cpu")
            .match_query(Matcher::UrlEncoded("imageName".into(), "app:v1".into()))
            .with_status(200)
            .with_body(r#"{"cpuRequests":"2","cpuLimits":"4"}"#)
            .expect(2)
            .create_async()
            .await;

        let policy = auto_policy(&server.url());
        let first = container("app", "app:v1", Some("1"), Some("1"));
        let second = container("worker", "app:v1", Some("1"), Some("1"));

        assert!(policy.new_resources(&first).await.is_some());
        assert!(policy.new_resources(&second).await.is_some());
        assert!(policy.cache().contains("app:v1"));

        policy.on_reverted("app:v1");
        assert!(!policy.cache().contains("app:v1"));

        assert!(policy.new_resources(&first).await.is_some());
        mock.assert_async().await;
    }

    #[test]
    fn test_settings_report_endpoint() {
        let policy = auto_policy("http://predictor:8080");
        assert_eq!(
            policy.settings(),
            ResourcePolicySettings::AutoPredicted {
                endpoint: policy.endpoint().to_string(),
            }
        );
    }
}
