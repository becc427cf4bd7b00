//! Virtual disk images with MBR/EBR partition tables.
//!
//! A disk is a host file of a fixed declared size whose first
//! [`MBR_SIZE`](mbr::MBR_SIZE) bytes hold the master boot record. Primary and
//! extended partitions live in the 4-slot MBR table; logical partitions live
//! inside the extended partition as a singly-linked chain of extended boot
//! records. Placement uses the First/Best/Worst fit algorithms over the free
//! gaps of the managed region.

pub mod disk;
pub mod ebr;
pub mod fit;
pub mod manager;
pub mod mbr;
pub mod mount;

pub use disk::{create_disk, disk_info, open_disk, remove_disk, DiskInfo};
pub use ebr::{Ebr, EBR_END, EBR_SIZE};
pub use fit::{Fit, Unit};
pub use manager::{
    create_partition, delete_partition, list_partitions, logical_partitions, resize_partition,
    DeleteMode, LogicalInfo, PartitionInfo, PartitionKind, PartitionSpec,
};
pub use mbr::{Mbr, Partition, MBR_SIZE, PARTITION_NAME_LEN};
pub use mount::{MountRegistry, MountedPartition};

/// Errors produced by the disk and partition layer.
#[derive(Debug, thiserror::Error)]
pub enum PartError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("disk file does not exist: {0}")]
    DiskMissing(String),

    #[error("disk is too small to hold a master boot record")]
    DiskTooSmall,

    #[error("invalid parameter: {0}")]
    BadParam(String),

    #[error("no free gap fits {0} bytes")]
    NoSpace(i64),

    #[error("a partition named '{0}' already exists")]
    DuplicateName(String),

    #[error("partition '{0}' not found")]
    NotFound(String),

    #[error("the partition table has no free slot")]
    SlotFull,

    #[error("the disk already has an extended partition")]
    ExtendedExists,

    #[error("a logical partition requires an extended partition")]
    NoExtended,

    #[error("cycle detected in the extended boot record chain at offset {0}")]
    ChainCycle(i64),

    #[error("partition '{0}' is already mounted")]
    AlreadyMounted(String),

    #[error("no partition is mounted under id '{0}'")]
    NotMounted(String),

    #[error("resize would leave partition '{0}' without any space")]
    BadResize(String),
}

pub type Result<T> = std::result::Result<T, PartError>;
