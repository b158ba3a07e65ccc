//! AWS adapter for S3, EC2 and Lambda.
//!
//! Requests are signed with SigV4 and sent through the shared REST client.
//! EC2 speaks the query protocol (form POST, XML reply), S3 answers XML and
//! Lambda answers JSON.
//!
//! Env: `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, optional
//! `AWS_SESSION_TOKEN`, `AWS_REGION` / `AWS_DEFAULT_REGION` (default
//! `us-east-1`) and `AWS_ENDPOINT_URL` to point every service at one
//! endpoint such as LocalStack.

pub mod sigv4;
mod xml;

use async_trait::async_trait;
use chrono::Utc;
use reqwest::Method;
use serde_json::{json, Value};
use url::Url;

use self::sigv4::Credentials;
use super::{resource, tool, Adapter};
use crate::args;
use crate::config;
use crate::error::{AdapterError, Result, ResultExt};
use crate::http::{pretty, Reply, RestClient};

const EC2_API_VERSION: &str = "2016-11-15";
const DEFAULT_REGION: &str = "us-east-1";
const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";

pub struct Aws {
    client: RestClient,
    creds: Credentials,
    region: String,
    endpoint: Option<String>,
}

/// Build an error from an AWS XML or JSON error body.
fn aws_error(status: u16, body: &str) -> AdapterError {
    match xml::error_message(body) {
        Some(message) => AdapterError::Status {
            service: "AWS",
            status,
            message,
        },
        None => AdapterError::status("AWS", status, body),
    }
}

fn checked(reply: Reply) -> Result<Reply> {
    if reply.status.is_success() {
        Ok(reply)
    } else {
        Err(aws_error(reply.status_code(), &reply.text()))
    }
}

fn instance_types() -> Value {
    json!({
        "General Purpose": ["t2.micro", "t2.small", "t3.medium", "m5.large", "m6g.xlarge"],
        "Compute Optimized": ["c5.large", "c6g.xlarge", "c5n.2xlarge"],
        "Memory Optimized": ["r5.large", "r6g.xlarge", "x1.16xlarge"],
        "Storage Optimized": ["i3.large", "d2.xlarge", "h1.2xlarge"],
        "Accelerated Computing": ["p3.2xlarge", "g4dn.xlarge", "inf1.xlarge"]
    })
}

/// `currentState`/`previousState` of the first item of a state change reply.
fn state_change(body: &str, set: &str, instance_id: &str) -> Value {
    let item = xml::items(body, set).into_iter().next().unwrap_or_default();
    let state = |tag: &str| {
        xml::element(item, tag)
            .and_then(|s| xml::text(s, "name"))
            .unwrap_or_else(|| "unknown".to_string())
    };
    json!({
        "Status": "Success",
        "InstanceId": instance_id,
        "CurrentState": state("currentState"),
        "PreviousState": state("previousState"),
    })
}

fn parse_instances(body: &str) -> Vec<Value> {
    let mut instances = Vec::new();
    for reservation in xml::items(body, "reservationSet") {
        for instance in xml::items(reservation, "instancesSet") {
            let name = xml::items(instance, "tagSet")
                .into_iter()
                .find(|tag| xml::text(tag, "key").as_deref() == Some("Name"))
                .and_then(|tag| xml::text(tag, "value"))
                .unwrap_or_else(|| "Unnamed".to_string());
            let state = xml::element(instance, "instanceState")
                .and_then(|s| xml::text(s, "name"))
                .unwrap_or_default();
            instances.push(json!({
                "InstanceId": xml::text_or(instance, "instanceId", ""),
                "Name": name,
                "InstanceType": xml::text_or(instance, "instanceType", ""),
                "State": state,
                "PublicIpAddress": xml::text_or(instance, "ipAddress", "None"),
                "PrivateIpAddress": xml::text_or(instance, "privateIpAddress", "None"),
                "LaunchTime": xml::text_or(instance, "launchTime", ""),
            }));
        }
    }
    instances
}

fn parse_images(body: &str) -> Vec<Value> {
    let mut images: Vec<Value> = xml::items(body, "imagesSet")
        .into_iter()
        .map(|image| {
            json!({
                "ImageId": xml::text_or(image, "imageId", ""),
                "Name": xml::text_or(image, "name", "Unnamed"),
                "CreationDate": xml::text_or(image, "creationDate", "Unknown"),
                "State": xml::text_or(image, "imageState", ""),
                "Public": xml::text(image, "isPublic").as_deref() == Some("true"),
                "Architecture": xml::text_or(image, "architecture", "Unknown"),
                "Platform": xml::text_or(image, "platform", "Linux/UNIX"),
                "Description": xml::text_or(image, "description", "No description"),
            })
        })
        .collect();
    // Newest first; ISO dates sort lexically.
    images.sort_by(|a, b| {
        b["CreationDate"]
            .as_str()
            .unwrap_or_default()
            .cmp(a["CreationDate"].as_str().unwrap_or_default())
    });
    images
}

fn parse_security_groups(body: &str) -> Vec<Value> {
    xml::items(body, "securityGroupInfo")
        .into_iter()
        .map(|sg| {
            json!({
                "GroupId": xml::text_or(sg, "groupId", ""),
                "GroupName": xml::text_or(sg, "groupName", ""),
                "Description": xml::text_or(sg, "groupDescription", ""),
                "VpcId": xml::text_or(sg, "vpcId", "None"),
                "InboundRuleCount": xml::items(sg, "ipPermissions").len(),
                "OutboundRuleCount": xml::items(sg, "ipPermissionsEgress").len(),
            })
        })
        .collect()
}

fn parse_objects(body: &str) -> Value {
    let objects: Vec<Value> = xml::elements(body, "Contents")
        .into_iter()
        .map(|obj| {
            json!({
                "Key": xml::text_or(obj, "Key", ""),
                "Size": xml::text(obj, "Size").and_then(|s| s.parse::<u64>().ok()).unwrap_or(0),
                "LastModified": xml::text_or(obj, "LastModified", ""),
                "StorageClass": xml::text_or(obj, "StorageClass", "STANDARD"),
            })
        })
        .collect();
    json!({
        "Count": objects.len(),
        "Objects": objects,
        "IsTruncated": xml::text(body, "IsTruncated").as_deref() == Some("true"),
    })
}

impl Aws {
    pub fn from_env() -> Result<Self> {
        let creds = Credentials {
            access_key: config::required("AWS_ACCESS_KEY_ID")?,
            secret_key: config::required("AWS_SECRET_ACCESS_KEY")?,
            session_token: config::optional("AWS_SESSION_TOKEN"),
        };
        let region = config::first_of(&["AWS_REGION", "AWS_DEFAULT_REGION"])
            .unwrap_or_else(|| DEFAULT_REGION.to_string());
        let endpoint = config::optional("AWS_ENDPOINT_URL");
        Self::new(creds, region, endpoint)
    }

    pub fn new(creds: Credentials, region: String, endpoint: Option<String>) -> Result<Self> {
        let base = endpoint.clone().unwrap_or_else(|| "https://amazonaws.com".to_string());
        let client = RestClient::builder("AWS", base)
            .timeout(config::http_timeout())
            .build()?;
        Ok(Self {
            client,
            creds,
            region,
            endpoint: endpoint.map(|e| e.trim_end_matches('/').to_string()),
        })
    }

    fn region<'a>(&'a self, args: &'a Value) -> &'a str {
        args::opt_str(args, "region").unwrap_or(&self.region)
    }

    fn endpoint(&self, service: &str, region: &str) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://{}.{}.amazonaws.com", service, region),
        }
    }

    /// Sign and send, returning the reply whatever its status.
    async fn signed(
        &self,
        method: Method,
        url: Url,
        service: &str,
        region: &str,
        body: Option<(&str, Vec<u8>)>,
    ) -> Result<Reply> {
        let payload = body.as_ref().map(|(_, b)| b.as_slice()).unwrap_or_default();
        let headers = sigv4::sign(&self.creds, method.as_str(), &url, region, service, payload, Utc::now())?;

        tracing::debug!(service, region, action = url.query().unwrap_or_default(), "signed aws request");
        let mut call = self.client.request(method, url.to_string());
        for (name, value) in headers {
            call = call.header(name, value);
        }
        if let Some((content_type, data)) = body {
            call = call.bytes(content_type, data);
        }
        call.send_unchecked().await
    }

    /// One EC2 query-protocol action; returns the XML body.
    async fn ec2(&self, action: &str, region: &str, params: &[(String, String)]) -> Result<String> {
        let mut form = vec![
            ("Action".to_string(), action.to_string()),
            ("Version".to_string(), EC2_API_VERSION.to_string()),
        ];
        form.extend_from_slice(params);
        let body = sigv4::canonical_query(&form).into_bytes();

        let url = Url::parse(&format!("{}/", self.endpoint("ec2", region)))?;
        let reply = self
            .signed(Method::POST, url, "ec2", region, Some((FORM_CONTENT_TYPE, body)))
            .await?;
        Ok(checked(reply)?.text())
    }

    fn s3_url(&self, region: &str, bucket: Option<&str>, query: &[(&str, String)]) -> Result<Url> {
        let mut url = match bucket {
            Some(bucket) => format!("{}/{}", self.endpoint("s3", region), urlencoding::encode(bucket)),
            None => format!("{}/", self.endpoint("s3", region)),
        };
        if !query.is_empty() {
            url.push('?');
            url.push_str(&sigv4::canonical_query(query));
        }
        Ok(Url::parse(&url)?)
    }

    async fn s3_get(&self, region: &str, bucket: Option<&str>, query: &[(&str, String)]) -> Result<Reply> {
        let url = self.s3_url(region, bucket, query)?;
        self.signed(Method::GET, url, "s3", region, None).await
    }

    async fn bucket_region(&self, bucket: &str) -> Result<String> {
        let reply = self
            .s3_get(&self.region, Some(bucket), &[("location", String::new())])
            .await?;
        let body = checked(reply)?.text();
        Ok(xml::text(&body, "LocationConstraint")
            .filter(|r| !r.is_empty())
            .unwrap_or_else(|| DEFAULT_REGION.to_string()))
    }

    async fn list_s3_buckets(&self, args: &Value) -> Result<String> {
        let region = self.region(args);
        let reply = self.s3_get(region, None, &[]).await?;
        let body = checked(reply)?.text();

        let mut buckets = Vec::new();
        for bucket in xml::elements(&body, "Bucket") {
            let name = xml::text_or(bucket, "Name", "");
            let region = match xml::text(bucket, "BucketRegion") {
                Some(region) => region,
                None => self.bucket_region(&name).await.unwrap_or_else(|e| {
                    tracing::warn!(bucket = %name, error = %e, "bucket location lookup failed");
                    DEFAULT_REGION.to_string()
                }),
            };
            buckets.push(json!({
                "Name": name,
                "CreationDate": xml::text_or(bucket, "CreationDate", ""),
                "Region": region,
            }));
        }
        Ok(pretty(&json!(buckets)))
    }

    async fn list_s3_objects(&self, args: &Value) -> Result<String> {
        let bucket = args::str(args, "bucket_name")?;
        let mut query = vec![
            ("list-type", "2".to_string()),
            ("max-keys", args::u64_or(args, "max_items", 100).to_string()),
        ];
        if let Some(prefix) = args::opt_str(args, "prefix") {
            query.push(("prefix", prefix.to_string()));
        }

        let mut reply = self.s3_get(&self.region, Some(bucket), &query).await?;
        // Buckets outside the default region answer 301 and name their region.
        if reply.status_code() == 301 {
            if let Some(region) = reply.header("x-amz-bucket-region").map(String::from) {
                tracing::debug!(bucket, region = %region, "retrying in bucket region");
                reply = self.s3_get(&region, Some(bucket), &query).await?;
            }
        }
        let body = checked(reply)?.text();
        Ok(pretty(&parse_objects(&body)))
    }

    async fn list_ec2_instances(&self, args: &Value) -> Result<String> {
        let mut params = Vec::new();
        if let Some(state) = args::opt_str(args, "state") {
            params.push(("Filter.1.Name".to_string(), "instance-state-name".to_string()));
            params.push(("Filter.1.Value.1".to_string(), state.to_string()));
        }
        let body = self.ec2("DescribeInstances", self.region(args), &params).await?;
        Ok(pretty(&json!(parse_instances(&body))))
    }

    async fn list_ec2_amis(&self, args: &Value) -> Result<String> {
        let owners = args::string_list(args, "owners")
            .filter(|o| !o.is_empty())
            .unwrap_or_else(|| vec!["self".to_string()]);
        let params: Vec<(String, String)> = owners
            .into_iter()
            .enumerate()
            .map(|(i, owner)| (format!("Owner.{}", i + 1), owner))
            .collect();
        let body = self.ec2("DescribeImages", self.region(args), &params).await?;
        Ok(pretty(&json!(parse_images(&body))))
    }

    async fn change_state(&self, args: &Value, action: &str, set: &str) -> Result<String> {
        let instance_id = args::str(args, "instance_id")?;
        let params = [("InstanceId.1".to_string(), instance_id.to_string())];
        let body = self.ec2(action, self.region(args), &params).await?;
        Ok(pretty(&state_change(&body, set, instance_id)))
    }

    async fn create_ec2_instance(&self, args: &Value) -> Result<String> {
        let region = self.region(args);
        let mut params = vec![
            ("ImageId".to_string(), args::str(args, "ami_id")?.to_string()),
            ("InstanceType".to_string(), args::str_or(args, "instance_type", "t2.micro").to_string()),
            ("MinCount".to_string(), "1".to_string()),
            ("MaxCount".to_string(), "1".to_string()),
        ];
        if let Some(key) = args::opt_str(args, "key_name") {
            params.push(("KeyName".to_string(), key.to_string()));
        }
        for (i, sg) in args::string_list(args, "security_group_ids").unwrap_or_default().into_iter().enumerate() {
            params.push((format!("SecurityGroupId.{}", i + 1), sg));
        }
        if let Some(subnet) = args::opt_str(args, "subnet_id") {
            params.push(("SubnetId".to_string(), subnet.to_string()));
        }

        let body = self.ec2("RunInstances", region, &params).await?;
        let instance = xml::items(&body, "instancesSet").into_iter().next().unwrap_or_default();
        let instance_id = xml::text_or(instance, "instanceId", "");

        if let Some(name) = args::opt_str(args, "name") {
            let tags = [
                ("ResourceId.1".to_string(), instance_id.clone()),
                ("Tag.1.Key".to_string(), "Name".to_string()),
                ("Tag.1.Value".to_string(), name.to_string()),
            ];
            self.ec2("CreateTags", region, &tags)
                .await
                .context(format!("Instance {} launched but tagging failed", instance_id))?;
        }

        let state = xml::element(instance, "instanceState")
            .and_then(|s| xml::text(s, "name"))
            .unwrap_or_default();
        Ok(pretty(&json!({
            "Status": "Success",
            "InstanceId": instance_id,
            "InstanceType": xml::text_or(instance, "instanceType", ""),
            "State": state,
            "PrivateIpAddress": xml::text_or(instance, "privateIpAddress", "None"),
        })))
    }

    async fn list_lambda_functions(&self, args: &Value) -> Result<String> {
        let region = self.region(args);
        let url = Url::parse(&format!("{}/2015-03-31/functions/", self.endpoint("lambda", region)))?;
        let reply = self.signed(Method::GET, url, "lambda", region, None).await?;
        let body = checked(reply)?.json()?;
        let functions: Vec<Value> = body["Functions"]
            .as_array()
            .into_iter()
            .flatten()
            .map(|f| {
                json!({
                    "FunctionName": f["FunctionName"],
                    "Runtime": f["Runtime"],
                    "Handler": f["Handler"],
                    "LastModified": f["LastModified"],
                    "MemorySize": f["MemorySize"],
                    "Timeout": f["Timeout"],
                    "Description": f["Description"].as_str().unwrap_or_default(),
                    "Role": f["Role"],
                })
            })
            .collect();
        Ok(pretty(&json!(functions)))
    }

    async fn list_regions(&self) -> Result<String> {
        let body = self.ec2("DescribeRegions", &self.region, &[]).await?;
        let regions: Vec<String> = xml::items(&body, "regionInfo")
            .into_iter()
            .filter_map(|r| xml::text(r, "regionName"))
            .collect();
        Ok(pretty(&json!(regions)))
    }
}

#[async_trait]
impl Adapter for Aws {
    fn name(&self) -> &'static str {
        "aws"
    }

    fn instructions(&self) -> &'static str {
        "AWS: list S3 buckets and objects, manage EC2 instances, AMIs and security groups, list Lambda functions."
    }

    fn tools(&self) -> Vec<Value> {
        let region_only = json!({
            "type": "object",
            "properties": { "region": { "type": "string", "description": "AWS region; defaults to the configured region" } }
        });
        let instance = json!({
            "type": "object",
            "properties": {
                "instance_id": { "type": "string" },
                "region": { "type": "string" }
            },
            "required": ["instance_id"]
        });

        vec![
            tool("list_s3_buckets", "List S3 buckets with their regions.", region_only.clone()),
            tool("list_s3_objects", "List objects in an S3 bucket.", json!({
                "type": "object",
                "properties": {
                    "bucket_name": { "type": "string" },
                    "prefix": { "type": "string" },
                    "max_items": { "type": "integer", "default": 100 }
                },
                "required": ["bucket_name"]
            })),
            tool("list_ec2_instances", "List EC2 instances.", json!({
                "type": "object",
                "properties": {
                    "region": { "type": "string" },
                    "state": { "type": "string", "description": "Instance state filter, e.g. running or stopped" }
                }
            })),
            tool("list_ec2_amis", "List AMIs, newest first.", json!({
                "type": "object",
                "properties": {
                    "owners": { "type": "array", "items": { "type": "string" }, "default": ["self"] },
                    "region": { "type": "string" }
                }
            })),
            tool("start_ec2_instance", "Start an EC2 instance.", instance.clone()),
            tool("stop_ec2_instance", "Stop an EC2 instance.", instance),
            tool("create_ec2_instance", "Launch an EC2 instance, tagging it when a name is given.", json!({
                "type": "object",
                "properties": {
                    "ami_id": { "type": "string" },
                    "instance_type": { "type": "string", "default": "t2.micro" },
                    "key_name": { "type": "string" },
                    "security_group_ids": { "type": "array", "items": { "type": "string" } },
                    "subnet_id": { "type": "string" },
                    "name": { "type": "string" },
                    "region": { "type": "string" }
                },
                "required": ["ami_id"]
            })),
            tool("list_security_groups", "List EC2 security groups.", region_only.clone()),
            tool("list_lambda_functions", "List Lambda functions.", region_only),
        ]
    }

    async fn call_tool(&self, name: &str, args: &Value) -> Result<String> {
        match name {
            "list_s3_buckets" => self.list_s3_buckets(args).await,
            "list_s3_objects" => self.list_s3_objects(args).await,
            "list_ec2_instances" => self.list_ec2_instances(args).await,
            "list_ec2_amis" => self.list_ec2_amis(args).await,
            "start_ec2_instance" => self.change_state(args, "StartInstances", "instancesSet").await,
            "stop_ec2_instance" => self.change_state(args, "StopInstances", "instancesSet").await,
            "create_ec2_instance" => self.create_ec2_instance(args).await,
            "list_security_groups" => {
                let body = self.ec2("DescribeSecurityGroups", self.region(args), &[]).await?;
                Ok(pretty(&json!(parse_security_groups(&body))))
            }
            "list_lambda_functions" => self.list_lambda_functions(args).await,
            _ => Err(AdapterError::UnknownTool(name.to_string())),
        }
    }

    fn resources(&self) -> Vec<Value> {
        vec![
            resource("aws://regions", "regions", "AWS regions available to the account", "application/json"),
            resource("aws://ec2/instance-types", "instance-types", "Common EC2 instance types by family", "application/json"),
        ]
    }

    async fn read_resource(&self, uri: &str) -> Result<String> {
        match uri {
            "aws://regions" => self.list_regions().await,
            "aws://ec2/instance-types" => Ok(pretty(&instance_types())),
            _ => Err(AdapterError::UnknownResource(uri.to_string())),
        }
    }
}
