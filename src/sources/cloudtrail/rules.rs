//! Resource type inference from `requestParameters` keys.
//!
//! Rules are evaluated in order and the first match wins, regardless of how
//! many later rules would also match.

use crate::core::config::{RuleConfig, TypeStyle};
use serde_json::{Map, Value};
use std::fmt;

/// Inferred resource type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ResourceType {
    CloudTrailTrail,
    S3Bucket,
    Ec2Instance,
    Ami,
    Volume,
    Snapshot,
    AvailabilityZone,
    SecurityGroup,
    Subnet,
    Vpc,
    IamRole,
    IamPolicy,
    IamInstanceProfile,
    LambdaFunction,
    ApiGateway,
    CloudFormationStack,
    AwsConfig,
    CustomerGateway,
    DhcpOptions,
    NetworkAcl,
    ReservedOrSpotInstances,
    CodeCommit,
    AcmCertificate,
    MfaDevice,
    GenericQuery,
    /// Declared in the config file.
    Custom(String),
}

impl ResourceType {
    pub fn as_str(&self) -> &str {
        match self {
            ResourceType::CloudTrailTrail => "CloudTrailTrail",
            ResourceType::S3Bucket => "S3Bucket",
            ResourceType::Ec2Instance => "EC2Instance",
            ResourceType::Ami => "AMI",
            ResourceType::Volume => "Volume",
            ResourceType::Snapshot => "Snapshot",
            ResourceType::AvailabilityZone => "AvailabilityZone",
            ResourceType::SecurityGroup => "SecurityGroup",
            ResourceType::Subnet => "Subnet",
            ResourceType::Vpc => "VPC",
            ResourceType::IamRole => "IAMRole",
            ResourceType::IamPolicy => "IAMPolicy",
            ResourceType::IamInstanceProfile => "IAMInstanceProfile",
            ResourceType::LambdaFunction => "LambdaFunction",
            ResourceType::ApiGateway => "APIGateway",
            ResourceType::CloudFormationStack => "CloudFormationStack",
            ResourceType::AwsConfig => "AWSConfig",
            ResourceType::CustomerGateway => "CustomerGateway",
            ResourceType::DhcpOptions => "DHCPOptions",
            ResourceType::NetworkAcl => "NetworkAcl",
            ResourceType::ReservedOrSpotInstances => "ReservedOrSpotInstances",
            ResourceType::CodeCommit => "CodeCommit",
            ResourceType::AcmCertificate => "ACMCertificate",
            ResourceType::MfaDevice => "MFADevice",
            ResourceType::GenericQuery => "GenericQuery",
            ResourceType::Custom(name) => name,
        }
    }

    /// Tag as written to the Resource table.
    pub fn render(&self, style: TypeStyle) -> String {
        match style {
            TypeStyle::Pascal => self.as_str().to_string(),
            TypeStyle::Lower => self.as_str().to_lowercase(),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Predicate over the keys of a `requestParameters` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyPredicate {
    /// The key is present, whatever its value.
    Has(String),
    /// The key holds a JSON array.
    IsArray(String),
    /// The key holds a string starting with `prefix`.
    StartsWith { key: String, prefix: String },
    Any(Vec<KeyPredicate>),
    All(Vec<KeyPredicate>),
}

impl KeyPredicate {
    pub fn matches(&self, params: &Map<String, Value>) -> bool {
        match self {
            KeyPredicate::Has(key) => params.contains_key(key),
            KeyPredicate::IsArray(key) => params.get(key).is_some_and(Value::is_array),
            KeyPredicate::StartsWith { key, prefix } => params
                .get(key)
                .and_then(Value::as_str)
                .is_some_and(|value| value.starts_with(prefix.as_str())),
            KeyPredicate::Any(parts) => parts.iter().any(|part| part.matches(params)),
            KeyPredicate::All(parts) => parts.iter().all(|part| part.matches(params)),
        }
    }
}

fn has(key: &str) -> KeyPredicate {
    KeyPredicate::Has(key.to_string())
}

fn any_key(keys: &[&str]) -> KeyPredicate {
    KeyPredicate::Any(keys.iter().map(|key| has(key)).collect())
}

fn all(parts: Vec<KeyPredicate>) -> KeyPredicate {
    KeyPredicate::All(parts)
}

fn any(parts: Vec<KeyPredicate>) -> KeyPredicate {
    KeyPredicate::Any(parts)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceRule {
    pub predicate: KeyPredicate,
    pub resource_type: ResourceType,
}

impl ResourceRule {
    pub fn new(predicate: KeyPredicate, resource_type: ResourceType) -> Self {
        Self {
            predicate,
            resource_type,
        }
    }

    /// Compiles a config rule: every `all` key and at least one `any` key.
    pub fn from_config(config: &RuleConfig) -> Self {
        let mut parts: Vec<KeyPredicate> = config.all.iter().map(|key| has(key)).collect();
        if !config.any.is_empty() {
            parts.push(KeyPredicate::Any(config.any.iter().map(|key| has(key)).collect()));
        }
        Self::new(
            KeyPredicate::All(parts),
            ResourceType::Custom(config.resource_type.trim().to_string()),
        )
    }
}

/// Ordered rule cascade.
#[derive(Debug, Clone)]
pub struct ResourceClassifier {
    rules: Vec<ResourceRule>,
}

impl Default for ResourceClassifier {
    fn default() -> Self {
        Self {
            rules: builtin_rules(),
        }
    }
}

impl ResourceClassifier {
    /// Built-in cascade preceded by `extra` rules in declaration order.
    pub fn with_custom_rules(extra: &[RuleConfig]) -> Self {
        let mut rules: Vec<ResourceRule> = extra.iter().map(ResourceRule::from_config).collect();
        rules.extend(builtin_rules());
        Self { rules }
    }

    pub fn rules(&self) -> &[ResourceRule] {
        &self.rules
    }

    /// Returns the type of the first matching rule, or `None` when the
    /// parameters are missing, empty or match nothing.
    pub fn classify(&self, params: Option<&Map<String, Value>>) -> Option<&ResourceType> {
        let params = params.filter(|params| !params.is_empty())?;
        self.rules
            .iter()
            .find(|rule| rule.predicate.matches(params))
            .map(|rule| &rule.resource_type)
    }
}

fn builtin_rules() -> Vec<ResourceRule> {
    use ResourceType::*;

    vec![
        ResourceRule::new(
            any(vec![
                has("trailNameList"),
                all(vec![has("name"), any_key(&["s3BucketName", "enableLogFileValidation"])]),
            ]),
            CloudTrailTrail,
        ),
        ResourceRule::new(
            all(vec![
                has("bucketName"),
                any(vec![
                    any_key(&[
                        "CreateBucketConfiguration",
                        "bucketPolicy",
                        "logging",
                        "replication",
                        "website",
                        "acl",
                        "tagging",
                        "versioning",
                    ]),
                    KeyPredicate::IsArray("policy".to_string()),
                ]),
            ]),
            S3Bucket,
        ),
        ResourceRule::new(has("instancesSet"), Ec2Instance),
        ResourceRule::new(
            any(vec![
                has("imagesSet"),
                KeyPredicate::StartsWith {
                    key: "imageId".to_string(),
                    prefix: "ami-".to_string(),
                },
            ]),
            Ami,
        ),
        ResourceRule::new(any_key(&["volumeSet", "volumeId"]), Volume),
        ResourceRule::new(any_key(&["snapshotSet", "snapshotId"]), Snapshot),
        ResourceRule::new(has("availabilityZoneSet"), AvailabilityZone),
        ResourceRule::new(
            any_key(&["securityGroupSet", "securityGroupIdSet", "ipPermissions"]),
            SecurityGroup,
        ),
        ResourceRule::new(any_key(&["subnetSet", "subnetId"]), Subnet),
        ResourceRule::new(any_key(&["vpcSet", "vpcId"]), Vpc),
        ResourceRule::new(
            all(vec![
                has("roleName"),
                any_key(&["assumeRolePolicyDocument", "policyDocument"]),
            ]),
            IamRole,
        ),
        ResourceRule::new(any_key(&["policyName", "policyArn"]), IamPolicy),
        ResourceRule::new(has("instanceProfileName"), IamInstanceProfile),
        ResourceRule::new(all(vec![has("functionName"), has("handler")]), LambdaFunction),
        ResourceRule::new(has("restApiId"), ApiGateway),
        ResourceRule::new(has("stackStatusFilter"), CloudFormationStack),
        ResourceRule::new(
            any_key(&["configurationRecorder", "deliveryChannel"]),
            AwsConfig,
        ),
        ResourceRule::new(has("customerGatewaySet"), CustomerGateway),
        ResourceRule::new(has("dhcpOptionsSet"), DhcpOptions),
        ResourceRule::new(has("networkAclIdSet"), NetworkAcl),
        ResourceRule::new(
            any_key(&["reservedInstancesSet", "spotInstanceRequestIdSet"]),
            ReservedOrSpotInstances,
        ),
        ResourceRule::new(has("repositoryNames"), CodeCommit),
        ResourceRule::new(has("certificateStatuses"), AcmCertificate),
        ResourceRule::new(any_key(&["virtualMFADeviceName", "serialNumber"]), MfaDevice),
        ResourceRule::new(
            any_key(&["maxResults", "nextToken", "filterSet", "pageSize", "limit"]),
            GenericQuery,
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classify(params: Value) -> Option<ResourceType> {
        let classifier = ResourceClassifier::default();
        classifier.classify(params.as_object()).cloned()
    }

    #[test]
    fn bucket_with_logging_is_s3_bucket() {
        assert_eq!(
            classify(json!({ "bucketName": "b", "logging": {} })),
            Some(ResourceType::S3Bucket)
        );
    }

    #[test]
    fn bare_bucket_name_is_not_a_bucket_rule() {
        assert_eq!(classify(json!({ "bucketName": "b" })), None);
        assert_eq!(
            classify(json!({ "bucketName": "b", "policy": "x" })),
            None
        );
        assert_eq!(
            classify(json!({ "bucketName": "b", "policy": [] })),
            Some(ResourceType::S3Bucket)
        );
    }

    #[test]
    fn instances_set_wins_over_later_rules() {
        assert_eq!(
            classify(json!({
                "instancesSet": { "items": [] },
                "volumeId": "vol-1",
                "vpcId": "vpc-1",
                "maxResults": 5
            })),
            Some(ResourceType::Ec2Instance)
        );
    }

    #[test]
    fn trail_rule_precedes_bucket_rule() {
        assert_eq!(
            classify(json!({ "name": "t", "s3BucketName": "logs", "bucketName": "b", "acl": {} })),
            Some(ResourceType::CloudTrailTrail)
        );
    }

    #[test]
    fn ami_requires_prefix() {
        assert_eq!(classify(json!({ "imageId": "ami-123" })), Some(ResourceType::Ami));
        assert_eq!(classify(json!({ "imageId": "img-123" })), None);
        assert_eq!(classify(json!({ "imageId": null })), None);
    }

    #[test]
    fn role_needs_policy_document() {
        assert_eq!(classify(json!({ "roleName": "r" })), None);
        assert_eq!(
            classify(json!({ "roleName": "r", "assumeRolePolicyDocument": "{}" })),
            Some(ResourceType::IamRole)
        );
    }

    #[test]
    fn pagination_falls_through_to_generic_query() {
        assert_eq!(
            classify(json!({ "nextToken": null })),
            Some(ResourceType::GenericQuery)
        );
    }

    #[test]
    fn empty_or_missing_params_match_nothing() {
        let classifier = ResourceClassifier::default();
        assert_eq!(classifier.classify(None), None);
        assert_eq!(classify(json!({})), None);
        assert_eq!(classify(json!({ "unrelated": 1 })), None);
    }

    #[test]
    fn builtin_cascade_has_stable_order() {
        let classifier = ResourceClassifier::default();
        let tags: Vec<&str> = classifier
            .rules()
            .iter()
            .map(|rule| rule.resource_type.as_str())
            .collect();
        assert_eq!(
            tags,
            vec![
                "CloudTrailTrail",
                "S3Bucket",
                "EC2Instance",
                "AMI",
                "Volume",
                "Snapshot",
                "AvailabilityZone",
                "SecurityGroup",
                "Subnet",
                "VPC",
                "IAMRole",
                "IAMPolicy",
                "IAMInstanceProfile",
                "LambdaFunction",
                "APIGateway",
                "CloudFormationStack",
                "AWSConfig",
                "CustomerGateway",
                "DHCPOptions",
                "NetworkAcl",
                "ReservedOrSpotInstances",
                "CodeCommit",
                "ACMCertificate",
                "MFADevice",
                "GenericQuery",
            ]
        );
    }

    #[test]
    fn every_builtin_rule_matches_its_keys() {
        let cases = [
            (json!({ "trailNameList": [] }), "CloudTrailTrail"),
            (json!({ "name": "t", "s3BucketName": "b" }), "CloudTrailTrail"),
            (json!({ "name": "t", "enableLogFileValidation": true }), "CloudTrailTrail"),
            (json!({ "bucketName": "b", "CreateBucketConfiguration": {} }), "S3Bucket"),
            (json!({ "bucketName": "b", "bucketPolicy": {} }), "S3Bucket"),
            (json!({ "bucketName": "b", "replication": {} }), "S3Bucket"),
            (json!({ "bucketName": "b", "website": {} }), "S3Bucket"),
            (json!({ "bucketName": "b", "acl": "" }), "S3Bucket"),
            (json!({ "bucketName": "b", "tagging": "" }), "S3Bucket"),
            (json!({ "bucketName": "b", "versioning": "" }), "S3Bucket"),
            (json!({ "instancesSet": {} }), "EC2Instance"),
            (json!({ "imagesSet": {} }), "AMI"),
            (json!({ "volumeSet": {} }), "Volume"),
            (json!({ "volumeId": "vol-1" }), "Volume"),
            (json!({ "snapshotSet": {} }), "Snapshot"),
            (json!({ "snapshotId": "snap-1" }), "Snapshot"),
            (json!({ "availabilityZoneSet": {} }), "AvailabilityZone"),
            (json!({ "securityGroupSet": {} }), "SecurityGroup"),
            (json!({ "securityGroupIdSet": {} }), "SecurityGroup"),
            (json!({ "ipPermissions": {} }), "SecurityGroup"),
            (json!({ "subnetSet": {} }), "Subnet"),
            (json!({ "subnetId": "subnet-1" }), "Subnet"),
            (json!({ "vpcSet": {} }), "VPC"),
            (json!({ "vpcId": "vpc-1" }), "VPC"),
            (json!({ "roleName": "r", "policyDocument": "{}" }), "IAMRole"),
            (json!({ "policyName": "p" }), "IAMPolicy"),
            (json!({ "policyArn": "arn:aws:iam::aws:policy/x" }), "IAMPolicy"),
            (json!({ "instanceProfileName": "ip" }), "IAMInstanceProfile"),
            (json!({ "functionName": "f", "handler": "index.handler" }), "LambdaFunction"),
            (json!({ "restApiId": "abc" }), "APIGateway"),
            (json!({ "stackStatusFilter": [] }), "CloudFormationStack"),
            (json!({ "configurationRecorder": {} }), "AWSConfig"),
            (json!({ "deliveryChannel": {} }), "AWSConfig"),
            (json!({ "customerGatewaySet": {} }), "CustomerGateway"),
            (json!({ "dhcpOptionsSet": {} }), "DHCPOptions"),
            (json!({ "networkAclIdSet": {} }), "NetworkAcl"),
            (json!({ "reservedInstancesSet": {} }), "ReservedOrSpotInstances"),
            (json!({ "spotInstanceRequestIdSet": {} }), "ReservedOrSpotInstances"),
            (json!({ "repositoryNames": [] }), "CodeCommit"),
            (json!({ "certificateStatuses": [] }), "ACMCertificate"),
            (json!({ "virtualMFADeviceName": "m" }), "MFADevice"),
            (json!({ "serialNumber": "arn:aws:iam::1:mfa/m" }), "MFADevice"),
            (json!({ "maxResults": 10 }), "GenericQuery"),
            (json!({ "filterSet": {} }), "GenericQuery"),
            (json!({ "pageSize": 10 }), "GenericQuery"),
            (json!({ "limit": 10 }), "GenericQuery"),
        ];
        for (params, expected) in cases {
            let tag = classify(params.clone()).map(|resource_type| resource_type.as_str().to_string());
            assert_eq!(tag.as_deref(), Some(expected), "params: {params}");
        }
    }

    #[test]
    fn lambda_needs_handler() {
        assert_eq!(classify(json!({ "functionName": "f" })), None);
        assert_eq!(classify(json!({ "handler": "index.handler" })), None);
    }

    #[test]
    fn custom_rules_run_first() {
        let classifier = ResourceClassifier::with_custom_rules(&[RuleConfig {
            resource_type: "DynamoDBTable".to_string(),
            any: vec!["tableName".to_string()],
            all: Vec::new(),
        }]);
        let params = json!({ "tableName": "orders", "limit": 10 });
        assert_eq!(
            classifier.classify(params.as_object()),
            Some(&ResourceType::Custom("DynamoDBTable".to_string()))
        );
    }

    #[test]
    fn lower_style_renders_lowercase() {
        assert_eq!(ResourceType::Ec2Instance.render(TypeStyle::Lower), "ec2instance");
        assert_eq!(ResourceType::Ec2Instance.render(TypeStyle::Pascal), "EC2Instance");
    }
}
