use super::CORE;
use crate::error::NwbResult;
use crate::hdmf::container::Container;
use crate::io::{AttributeValue, BaseIo};
use crate::registered_type::{Entity, RegisteredType, TypedEntity};

/// Attribute naming the device manufacturer.
pub const MANUFACTURER_ATTR: &str = "manufacturer";

/// Acquisition hardware, stored under `/general/devices/<name>`.
#[derive(Debug)]
pub struct Device<'io> {
    container: Container<'io>,
}

impl<'io> Device<'io> {
    pub fn new(path: &str, io: &'io dyn BaseIo) -> Self {
        Self {
            container: Container::with_type(path, io, CORE, "Device"),
        }
    }

    pub fn initialize(&self, description: &str, manufacturer: &str) -> NwbResult<()> {
        self.container.initialize_typed(Some(description))?;
        self.container
            .set_attribute(MANUFACTURER_ATTR, AttributeValue::Str(manufacturer.to_string()))
    }
}

impl RegisteredType for Device<'_> {
    fn path(&self) -> &str {
        self.container.path()
    }

    fn io(&self) -> &dyn BaseIo {
        self.container.io()
    }

    fn namespace(&self) -> &str {
        self.container.namespace()
    }

    fn type_name(&self) -> &str {
        self.container.type_name()
    }
}

impl TypedEntity for Device<'_> {
    const NAMESPACE: &'static str = CORE;
    const TYPE_NAME: &'static str = "Device";

    fn create<'io>(path: &str, io: &'io dyn BaseIo) -> Entity<'io> {
        Entity::Device(Device::new(path, io))
    }
}
