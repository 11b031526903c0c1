//! XML response bodies converted to the JSON shapes the JSON-protocol
//! services use, so tools read every service the same way.

use serde_json::{Map, Value, json};

use crate::xml::Element;

fn text(el: &Element, name: &str) -> Value {
    el.text_of(name)
        .map(|t| Value::String(t.to_string()))
        .unwrap_or(Value::Null)
}

/// S3 `ListAllMyBucketsResult` → `{"Buckets": [{"Name", "CreationDate"}]}`.
pub fn list_buckets(root: &Element) -> Value {
    let buckets: Vec<Value> = root
        .child("Buckets")
        .map(|b| {
            b.children_named("Bucket")
                .map(|bucket| {
                    json!({
                        "Name": text(bucket, "Name"),
                        "CreationDate": text(bucket, "CreationDate"),
                    })
                })
                .collect()
        })
        .unwrap_or_default();
    json!({ "Buckets": buckets })
}

fn instance(item: &Element) -> Value {
    let tags: Vec<Value> = item
        .child("tagSet")
        .map(|set| {
            set.children_named("item")
                .map(|tag| json!({ "Key": text(tag, "key"), "Value": text(tag, "value") }))
                .collect()
        })
        .unwrap_or_default();

    let mut out = Map::new();
    out.insert("InstanceId".into(), text(item, "instanceId"));
    out.insert("InstanceType".into(), text(item, "instanceType"));
    out.insert(
        "State".into(),
        json!({
            "Name": item
                .child("instanceState")
                .map(|s| text(s, "name"))
                .unwrap_or(Value::Null)
        }),
    );
    out.insert("PrivateIpAddress".into(), text(item, "privateIpAddress"));
    out.insert("LaunchTime".into(), text(item, "launchTime"));
    out.insert("Tags".into(), Value::Array(tags));
    Value::Object(out)
}

/// EC2 `DescribeInstancesResponse` → `{"Reservations": [{"Instances": [...]}]}`.
pub fn describe_instances(root: &Element) -> Value {
    let reservations: Vec<Value> = root
        .child("reservationSet")
        .map(|set| {
            set.children_named("item")
                .map(|reservation| {
                    let instances: Vec<Value> = reservation
                        .child("instancesSet")
                        .map(|i| i.children_named("item").map(instance).collect())
                        .unwrap_or_default();
                    json!({
                        "ReservationId": text(reservation, "reservationId"),
                        "Instances": instances,
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    json!({
        "Reservations": reservations,
        "NextToken": text(root, "nextToken"),
    })
}

/// STS `AssumeRoleResponse` → `{"Credentials": {...}}`.
pub fn assume_role(root: &Element) -> Value {
    let creds = root
        .find("Credentials")
        .map(|c| {
            json!({
                "AccessKeyId": text(c, "AccessKeyId"),
                "SecretAccessKey": text(c, "SecretAccessKey"),
                "SessionToken": text(c, "SessionToken"),
                "Expiration": text(c, "Expiration"),
            })
        })
        .unwrap_or(Value::Null);
    json!({ "Credentials": creds })
}
