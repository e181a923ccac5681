//! Instance Custom Resource Definition
//!
//! An Instance names one InfluxDB deployment. Organizations reference
//! Instances by namespace and name; the operator never writes to them.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Specification for an Instance
#[derive(CustomResource, Clone, Debug, Deserialize, Serialize, JsonSchema, PartialEq)]
#[kube(
    group = "paradox.macro.re",
    version = "v1alpha1",
    kind = "Instance",
    plural = "instances",
    shortname = "inst",
    namespaced,
    printcolumn = r#"{"name":"Address","type":"string","jsonPath":".spec.address"}"#
)]
pub struct InstanceSpec {
    /// Base URL of the InfluxDB HTTP API (e.g. `http://influxdb.influx:8086`)
    pub address: String,
}
