//! Tagged volume specifications consumed at instance creation.

use aws_sdk_ec2::types::{BlockDeviceMapping, EbsBlockDevice, VolumeType as Ec2VolumeType};

use crate::error::CloudError;

/// Size given to a fresh volume when the caller does not specify one.
pub const DEFAULT_VOLUME_GIB: i32 = 8;

/// Closed set of supported volume types.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum VolumeType {
    /// General purpose SSD, third generation.
    #[default]
    Gp3,
    /// General purpose SSD, second generation.
    Gp2,
    /// Magnetic volume.
    Standard,
}

impl VolumeType {
    /// Provider-facing name of the volume type.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Gp3 => "gp3",
            Self::Gp2 => "gp2",
            Self::Standard => "standard",
        }
    }

    /// Parses a provider-facing name into the closed enumeration.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Configuration`] for unrecognised names.
    pub fn parse(value: &str) -> Result<Self, CloudError> {
        match value {
            "gp3" => Ok(Self::Gp3),
            "gp2" => Ok(Self::Gp2),
            "standard" => Ok(Self::Standard),
            other => Err(CloudError::configuration(format!(
                "unknown volume type '{other}', expected one of gp3, gp2, standard"
            ))),
        }
    }

    fn to_ec2(self) -> Ec2VolumeType {
        match self {
            Self::Gp3 => Ec2VolumeType::Gp3,
            Self::Gp2 => Ec2VolumeType::Gp2,
            Self::Standard => Ec2VolumeType::Standard,
        }
    }
}

impl std::fmt::Display for VolumeType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage consumed once at instance creation.
///
/// A snapshot reference carries no size or type: those attributes belong to
/// the snapshot itself and cannot be misapplied here. Fresh volumes are
/// deleted with the instance; snapshot-backed volumes persist independently
/// of it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Volume {
    /// Reference to an existing snapshot, attached as-is.
    Snapshot {
        /// Snapshot identifier.
        id: String,
    },
    /// Fresh volume created with the instance.
    New {
        /// Size in GiB, at least 1.
        gib: i32,
        /// Volume type.
        volume_type: VolumeType,
    },
}

impl Default for Volume {
    fn default() -> Self {
        Self::New {
            gib: DEFAULT_VOLUME_GIB,
            volume_type: VolumeType::Gp3,
        }
    }
}

impl Volume {
    /// Describes a fresh volume.
    ///
    /// # Errors
    ///
    /// Returns [`CloudError::Configuration`] when `gib` is not positive.
    pub fn new(gib: i32, volume_type: VolumeType) -> Result<Self, CloudError> {
        if gib < 1 {
            return Err(CloudError::configuration(format!(
                "volume size must be a positive number of GiB, got {gib}"
            )));
        }
        Ok(Self::New { gib, volume_type })
    }

    /// References an existing snapshot.
    #[must_use]
    pub fn from_snapshot(id: impl Into<String>) -> Self {
        Self::Snapshot { id: id.into() }
    }

    pub(crate) fn block_device_mapping(&self, device_name: &str) -> BlockDeviceMapping {
        let ebs = match self {
            Self::Snapshot { id } => EbsBlockDevice::builder()
                .snapshot_id(id)
                .delete_on_termination(false)
                .build(),
            Self::New { gib, volume_type } => EbsBlockDevice::builder()
                .volume_size(*gib)
                .volume_type(volume_type.to_ec2())
                .delete_on_termination(true)
                .build(),
        };
        BlockDeviceMapping::builder()
            .device_name(device_name)
            .ebs(ebs)
            .build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_volume_is_eight_gib_gp3() {
        assert_eq!(
            Volume::default(),
            Volume::New {
                gib: 8,
                volume_type: VolumeType::Gp3
            }
        );
    }

    #[test]
    fn zero_or_negative_sizes_are_rejected() {
        assert!(matches!(
            Volume::new(0, VolumeType::Gp3),
            Err(CloudError::Configuration { .. })
        ));
        assert!(matches!(
            Volume::new(-4, VolumeType::Gp2),
            Err(CloudError::Configuration { .. })
        ));
    }

    #[test]
    fn volume_type_names_round_trip() {
        for volume_type in [VolumeType::Gp3, VolumeType::Gp2, VolumeType::Standard] {
            assert_eq!(VolumeType::parse(volume_type.as_str()), Ok(volume_type));
        }
        assert!(matches!(
            VolumeType::parse("io2"),
            Err(CloudError::Configuration { .. })
        ));
    }

    #[test]
    fn fresh_volume_mapping_deletes_on_termination() {
        let volume = Volume::new(20, VolumeType::Gp2).expect("positive size");
        let mapping = volume.block_device_mapping("/dev/xvda");
        assert_eq!(mapping.device_name(), Some("/dev/xvda"));
        let ebs = mapping.ebs().expect("mapping should carry an ebs block");
        assert_eq!(ebs.volume_size(), Some(20));
        assert_eq!(ebs.volume_type(), Some(&Ec2VolumeType::Gp2));
        assert_eq!(ebs.delete_on_termination(), Some(true));
        assert_eq!(ebs.snapshot_id(), None);
    }

    #[test]
    fn snapshot_mapping_persists_past_termination() {
        let mapping = Volume::from_snapshot("snap-0abc").block_device_mapping("/dev/xvdb");
        let ebs = mapping.ebs().expect("mapping should carry an ebs block");
        assert_eq!(ebs.snapshot_id(), Some("snap-0abc"));
        assert_eq!(ebs.delete_on_termination(), Some(false));
        assert_eq!(ebs.volume_size(), None);
    }
}
