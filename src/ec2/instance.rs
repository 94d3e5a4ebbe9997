//! Instance specification and lifecycle handle.
//!
//! A handle is either unbound (carries a validated creation descriptor) or
//! bound (carries the id of a remote instance). `create` transitions unbound
//! to bound; `terminate` is terminal. Missing required fields are a
//! configuration error at construction, never a remote failure.

use aws_sdk_ec2::Client;
use aws_sdk_ec2::operation::run_instances::builders::RunInstancesFluentBuilder;
use aws_sdk_ec2::types::{
    BlockDeviceMapping, InstanceMarketOptionsRequest, InstanceType, MarketType, ResourceType,
    SpotInstanceType, SpotMarketOptions, Tag, TagSpecification,
};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use tracing::{debug, info};

use super::map_sdk_error;
use crate::config::AwsCredentials;
use crate::ec2::user_data::UserData;
use crate::ec2::volume::Volume;
use crate::error::CloudError;

/// Device names assigned to volumes in declaration order.
const DEVICE_NAMES: [&str; 5] = ["/dev/xvda", "/dev/xvdb", "/dev/xvdc", "/dev/xvdd", "/dev/xvde"];

/// Pricing mode for new instances.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum PricingMode {
    /// On-demand capacity.
    #[default]
    OnDemand,
    /// One-time spot request.
    Spot,
}

impl PricingMode {
    /// Canonical name of the pricing mode.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OnDemand => "on-demand",
            Self::Spot => "spot",
        }
    }

    /// Parses a canonical name into the closed enumeration.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Configuration`] for unrecognised names.
    pub fn parse(value: &str) -> Result<Self, CloudError> {
        match value {
            "on-demand" => Ok(Self::OnDemand),
            "spot" => Ok(Self::Spot),
            other => Err(CloudError::configuration(format!(
                "unknown pricing mode '{other}', expected one of spot, on-demand"
            ))),
        }
    }
}

/// Validated creation descriptor for a new instance.
///
/// Built through [`InstanceSpec::builder`], which requires a machine type
/// and a key pair before it succeeds.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct InstanceSpec {
    name: Option<String>,
    machine_type: String,
    pricing: PricingMode,
    key_pair: String,
    security_group_ids: Vec<String>,
    image_id: Option<String>,
    volumes: Vec<Volume>,
    user_data: Option<UserData>,
}

impl InstanceSpec {
    /// Starts a builder for an [`InstanceSpec`].
    #[must_use]
    pub fn builder() -> InstanceSpecBuilder {
        InstanceSpecBuilder::default()
    }

    /// Requested machine type.
    #[must_use]
    pub fn machine_type(&self) -> &str {
        &self.machine_type
    }

    /// Requested key pair name.
    #[must_use]
    pub fn key_pair(&self) -> &str {
        &self.key_pair
    }
}

/// Builder for [`InstanceSpec`] that defers validation to [`build`].
///
/// [`build`]: InstanceSpecBuilder::build
#[derive(Clone, Debug, Default)]
pub struct InstanceSpecBuilder {
    name: Option<String>,
    machine_type: Option<String>,
    pricing: PricingMode,
    key_pair: Option<String>,
    security_group_ids: Vec<String>,
    image_id: Option<String>,
    volumes: Vec<Volume>,
    user_data: Option<UserData>,
}

impl InstanceSpecBuilder {
    /// Sets the optional name tag.
    #[must_use]
    pub fn name(mut self, value: impl Into<String>) -> Self {
        self.name = Some(value.into());
        self
    }

    /// Sets the machine type, for example `t4g.micro`. Required.
    #[must_use]
    pub fn machine_type(mut self, value: impl Into<String>) -> Self {
        self.machine_type = Some(value.into());
        self
    }

    /// Sets the pricing mode. Defaults to on-demand.
    #[must_use]
    pub fn pricing(mut self, value: PricingMode) -> Self {
        self.pricing = value;
        self
    }

    /// Sets the SSH key pair name. Required.
    #[must_use]
    pub fn key_pair(mut self, value: impl Into<String>) -> Self {
        self.key_pair = Some(value.into());
        self
    }

    /// Adds one security group id.
    #[must_use]
    pub fn security_group_id(mut self, value: impl Into<String>) -> Self {
        self.security_group_ids.push(value.into());
        self
    }

    /// Sets the machine image id. Left unset, the provider default applies.
    #[must_use]
    pub fn image_id(mut self, value: impl Into<String>) -> Self {
        self.image_id = Some(value.into());
        self
    }

    /// Adds one volume. Left empty, creation defaults to a single fresh
    /// volume of 8 GiB, type gp3.
    #[must_use]
    pub fn volume(mut self, value: Volume) -> Self {
        self.volumes.push(value);
        self
    }

    /// Sets the first-boot user-data, raw text or a template.
    #[must_use]
    pub fn user_data(mut self, value: impl Into<UserData>) -> Self {
        self.user_data = Some(value.into());
        self
    }

    /// Builds and validates the spec, trimming string inputs.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Configuration`] when the machine type or key
    /// pair is missing or empty, or when more volumes are declared than
    /// device names exist to attach them.
    pub fn build(self) -> Result<InstanceSpec, CloudError> {
        let machine_type = required(self.machine_type, "machine_type")?;
        let key_pair = required(self.key_pair, "key_pair")?;
        if self.volumes.len() > DEVICE_NAMES.len() {
            return Err(CloudError::configuration(format!(
                "at most {} volumes can be attached, got {}",
                DEVICE_NAMES.len(),
                self.volumes.len()
            )));
        }
        Ok(InstanceSpec {
            name: self.name.map(|value| value.trim().to_owned()),
            machine_type,
            pricing: self.pricing,
            key_pair,
            security_group_ids: self.security_group_ids,
            image_id: self.image_id.map(|value| value.trim().to_owned()),
            volumes: self.volumes,
            user_data: self.user_data,
        })
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, CloudError> {
    match value.map(|value| value.trim().to_owned()) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(CloudError::configuration(format!(
            "'{field}' is required to create an instance"
        ))),
    }
}

#[derive(Clone, Debug)]
enum HandleState {
    Unbound(Box<InstanceSpec>),
    Bound { id: String },
    Terminated { id: String },
}

/// Handle to one remote instance, existing or yet to be created.
///
/// The id/state pair is the only mutable state in the crate; the mutating
/// lifecycle calls take `&mut self`, so sharing a handle across tasks
/// requires the caller's own synchronization.
#[derive(Clone, Debug)]
pub struct Instance {
    client: Client,
    credentials: AwsCredentials,
    state: HandleState,
}

impl Instance {
    pub(super) fn unbound(client: Client, credentials: AwsCredentials, spec: InstanceSpec) -> Self {
        Self {
            client,
            credentials,
            state: HandleState::Unbound(Box::new(spec)),
        }
    }

    pub(super) fn bound(client: Client, credentials: AwsCredentials, id: String) -> Self {
        Self {
            client,
            credentials,
            state: HandleState::Bound { id },
        }
    }

    /// Remote instance id. `None` until the handle is bound by
    /// construction-from-id or a successful [`create`](Self::create).
    #[must_use]
    pub fn id(&self) -> Option<&str> {
        match &self.state {
            HandleState::Unbound(_) => None,
            HandleState::Bound { id } | HandleState::Terminated { id } => Some(id),
        }
    }

    /// Creates the remote instance and binds the handle to its id.
    ///
    /// Resolves the volume list (one 8 GiB gp3 volume when none was given),
    /// renders the user-data, and issues a single creation call. On success
    /// the assigned id is stored and returned.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Configuration`] when the handle is already
    /// bound or terminated, and [`CloudError::RemoteIo`] when the provider
    /// rejects the request (quota and capacity included).
    pub async fn create(&mut self) -> Result<String, CloudError> {
        let spec = match &self.state {
            HandleState::Unbound(spec) => spec.as_ref().clone(),
            HandleState::Bound { id } => {
                return Err(CloudError::configuration(format!(
                    "instance {id} is already bound, create() is only valid before an id is assigned"
                )));
            }
            HandleState::Terminated { id } => {
                return Err(terminated_error(id));
            }
        };
        debug!(machine_type = %spec.machine_type, "creating instance");
        let request = build_run_instances(&self.client, &self.credentials, &spec)?;
        let output = request
            .send()
            .await
            .map_err(|err| map_sdk_error("create", &spec.machine_type, err))?;
        let id = output
            .instances()
            .first()
            .and_then(|instance| instance.instance_id())
            .map(str::to_owned)
            .ok_or_else(|| CloudError::RemoteIo {
                operation: "create",
                target: spec.machine_type.clone(),
                message: String::from("provider returned no instance"),
            })?;
        info!(instance_id = %id, machine_type = %spec.machine_type, "created instance");
        self.state = HandleState::Bound { id: id.clone() };
        Ok(id)
    }

    /// Starts the remote instance.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Configuration`] when the handle is unbound or
    /// terminated and [`CloudError::RemoteNotFound`] when the id no longer
    /// exists.
    pub async fn start(&self) -> Result<(), CloudError> {
        let id = self.bound_id("start")?;
        debug!(instance_id = %id, "starting instance");
        self.client
            .start_instances()
            .instance_ids(id)
            .send()
            .await
            .map_err(|err| map_sdk_error("start", id, err))?;
        Ok(())
    }

    /// Stops the remote instance.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Configuration`] when the handle is unbound or
    /// terminated and [`CloudError::RemoteNotFound`] when the id no longer
    /// exists.
    pub async fn stop(&self) -> Result<(), CloudError> {
        let id = self.bound_id("stop")?;
        debug!(instance_id = %id, "stopping instance");
        self.client
            .stop_instances()
            .instance_ids(id)
            .send()
            .await
            .map_err(|err| map_sdk_error("stop", id, err))?;
        Ok(())
    }

    /// Terminates the remote instance. Terminal: once it succeeds, every
    /// later lifecycle call on this handle is a configuration error.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Configuration`] when the handle is unbound or
    /// already terminated and [`CloudError::RemoteNotFound`] when the id no
    /// longer exists.
    pub async fn terminate(&mut self) -> Result<(), CloudError> {
        let id = self.bound_id("terminate")?.to_owned();
        self.client
            .terminate_instances()
            .instance_ids(&id)
            .send()
            .await
            .map_err(|err| map_sdk_error("terminate", &id, err))?;
        info!(instance_id = %id, "terminated instance");
        self.state = HandleState::Terminated { id };
        Ok(())
    }

    fn bound_id(&self, operation: &str) -> Result<&str, CloudError> {
        match &self.state {
            HandleState::Bound { id } => Ok(id),
            HandleState::Unbound(_) => Err(CloudError::configuration(format!(
                "cannot {operation} an instance with no id, call create() first or construct \
                 the handle from an existing id"
            ))),
            HandleState::Terminated { id } => Err(terminated_error(id)),
        }
    }
}

fn terminated_error(id: &str) -> CloudError {
    CloudError::configuration(format!(
        "instance {id} is terminated, no further lifecycle calls are allowed"
    ))
}

fn build_run_instances(
    client: &Client,
    credentials: &AwsCredentials,
    spec: &InstanceSpec,
) -> Result<RunInstancesFluentBuilder, CloudError> {
    let mut request = client
        .run_instances()
        .instance_type(InstanceType::from(spec.machine_type.as_str()))
        .key_name(&spec.key_pair)
        .min_count(1)
        .max_count(1);
    if let Some(image_id) = &spec.image_id {
        request = request.image_id(image_id);
    }
    for group in &spec.security_group_ids {
        request = request.security_group_ids(group);
    }
    if let Some(name) = &spec.name {
        request = request.tag_specifications(
            TagSpecification::builder()
                .resource_type(ResourceType::Instance)
                .tags(Tag::builder().key("Name").value(name).build())
                .build(),
        );
    }
    for mapping in block_device_mappings(&spec.volumes) {
        request = request.block_device_mappings(mapping);
    }
    if spec.pricing == PricingMode::Spot {
        request = request.instance_market_options(
            InstanceMarketOptionsRequest::builder()
                .market_type(MarketType::Spot)
                .spot_options(
                    SpotMarketOptions::builder()
                        .spot_instance_type(SpotInstanceType::OneTime)
                        .build(),
                )
                .build(),
        );
    }
    if let Some(user_data) = &spec.user_data {
        let script = user_data.render(credentials)?;
        request = request.user_data(BASE64.encode(script));
    }
    Ok(request)
}

/// Resolves the declared volume list into block device mappings, falling
/// back to a single default volume when none was declared. The list length
/// was validated against the device name table at build time.
fn block_device_mappings(volumes: &[Volume]) -> Vec<BlockDeviceMapping> {
    let default_volumes = [Volume::default()];
    let volumes = if volumes.is_empty() {
        &default_volumes
    } else {
        volumes
    };
    volumes
        .iter()
        .zip(DEVICE_NAMES)
        .map(|(volume, device_name)| volume.block_device_mapping(device_name))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ec2::volume::VolumeType;
    use aws_sdk_ec2::config::{BehaviorVersion, Region};
    use aws_sdk_ec2::types::VolumeType as Ec2VolumeType;

    fn test_client() -> Client {
        let config = aws_sdk_ec2::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        Client::from_conf(config)
    }

    fn minimal_spec() -> InstanceSpec {
        InstanceSpec::builder()
            .machine_type("t4g.micro")
            .key_pair("my-keypair")
            .build()
            .expect("machine type and key pair are set")
    }

    #[test]
    fn build_requires_machine_type_and_key_pair() {
        let missing_machine = InstanceSpec::builder().key_pair("kp").build();
        let Err(CloudError::Configuration { message }) = missing_machine else {
            panic!("expected configuration error");
        };
        assert!(message.contains("machine_type"), "got: {message}");

        let missing_key_pair = InstanceSpec::builder().machine_type("t4g.micro").build();
        let Err(CloudError::Configuration { message }) = missing_key_pair else {
            panic!("expected configuration error");
        };
        assert!(message.contains("key_pair"), "got: {message}");
    }

    #[test]
    fn build_rejects_blank_required_fields() {
        let result = InstanceSpec::builder()
            .machine_type("   ")
            .key_pair("kp")
            .build();
        assert!(matches!(result, Err(CloudError::Configuration { .. })));
    }

    #[test]
    fn build_trims_string_inputs() {
        let spec = InstanceSpec::builder()
            .machine_type(" t4g.micro ")
            .key_pair(" kp ")
            .build()
            .expect("fields are present");
        assert_eq!(spec.machine_type(), "t4g.micro");
        assert_eq!(spec.key_pair(), "kp");
    }

    #[test]
    fn build_rejects_more_volumes_than_device_names() {
        let mut builder = InstanceSpec::builder().machine_type("m6i.large").key_pair("kp");
        for _ in 0..6 {
            builder = builder.volume(Volume::default());
        }
        assert!(matches!(
            builder.build(),
            Err(CloudError::Configuration { .. })
        ));
    }

    #[test]
    fn default_volume_list_resolves_to_one_8_gib_gp3_mapping() {
        let mappings = block_device_mappings(&[]);
        assert_eq!(mappings.len(), 1);
        let mapping = mappings.first().expect("one mapping");
        assert_eq!(mapping.device_name(), Some("/dev/xvda"));
        let ebs = mapping.ebs().expect("ebs block");
        assert_eq!(ebs.volume_size(), Some(8));
        assert_eq!(ebs.volume_type(), Some(&Ec2VolumeType::Gp3));
    }

    #[test]
    fn declared_volumes_map_to_device_names_in_order() {
        let volumes = [
            Volume::from_snapshot("snap-1"),
            Volume::new(30, VolumeType::Gp3).expect("positive size"),
        ];
        let mappings = block_device_mappings(&volumes);
        let names: Vec<_> = mappings
            .iter()
            .filter_map(BlockDeviceMapping::device_name)
            .collect();
        assert_eq!(names, ["/dev/xvda", "/dev/xvdb"]);
    }

    #[tokio::test]
    async fn lifecycle_calls_on_an_unbound_handle_fail_without_a_remote_call() {
        let handle = Instance::unbound(test_client(), AwsCredentials::default(), minimal_spec());
        assert_eq!(handle.id(), None);
        assert!(matches!(
            handle.start().await,
            Err(CloudError::Configuration { .. })
        ));
        assert!(matches!(
            handle.stop().await,
            Err(CloudError::Configuration { .. })
        ));
    }

    #[tokio::test]
    async fn create_on_a_bound_handle_is_a_usage_error() {
        let mut handle = Instance::bound(
            test_client(),
            AwsCredentials::default(),
            String::from("i-1234567890abcdef0"),
        );
        assert_eq!(handle.id(), Some("i-1234567890abcdef0"));
        let Err(CloudError::Configuration { message }) = handle.create().await else {
            panic!("expected configuration error");
        };
        assert!(message.contains("already bound"), "got: {message}");
    }

    #[tokio::test]
    async fn every_call_on_a_terminated_handle_is_a_usage_error() {
        let mut handle = Instance::bound(
            test_client(),
            AwsCredentials::default(),
            String::from("i-dead"),
        );
        handle.state = HandleState::Terminated {
            id: String::from("i-dead"),
        };
        assert_eq!(handle.id(), Some("i-dead"));
        assert!(matches!(
            handle.start().await,
            Err(CloudError::Configuration { .. })
        ));
        assert!(matches!(
            handle.stop().await,
            Err(CloudError::Configuration { .. })
        ));
        assert!(matches!(
            handle.terminate().await,
            Err(CloudError::Configuration { .. })
        ));
        assert!(matches!(
            handle.create().await,
            Err(CloudError::Configuration { .. })
        ));
    }

    #[test]
    fn pricing_mode_names_round_trip() {
        assert_eq!(PricingMode::parse("spot"), Ok(PricingMode::Spot));
        assert_eq!(PricingMode::parse("on-demand"), Ok(PricingMode::OnDemand));
        assert!(matches!(
            PricingMode::parse("reserved"),
            Err(CloudError::Configuration { .. })
        ));
    }
}
