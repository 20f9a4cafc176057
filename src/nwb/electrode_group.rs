use super::{Device, CORE};
use crate::error::NwbResult;
use crate::hdmf::container::Container;
use crate::io::{AttributeValue, BaseIo};
use crate::registered_type::{Entity, RegisteredType, TypedEntity};

/// Attribute holding an electrode group's anatomical location.
pub const LOCATION_ATTR: &str = "location";

/// A group of electrodes on one device, stored under
/// `/general/extracellular_ephys/<group>`.
#[derive(Debug)]
pub struct ElectrodeGroup<'io> {
    container: Container<'io>,
}

impl<'io> ElectrodeGroup<'io> {
    pub fn new(path: &str, io: &'io dyn BaseIo) -> Self {
        Self {
            container: Container::with_type(path, io, CORE, "ElectrodeGroup"),
        }
    }

    /// Creates the group, its attributes, and a `device` link to `device`.
    pub fn initialize(&self, description: &str, location: &str, device: &Device<'_>) -> NwbResult<()> {
        self.container.initialize_typed(Some(description))?;
        self.container
            .set_attribute(LOCATION_ATTR, AttributeValue::Str(location.to_string()))?;
        self.io()
            .create_link(&self.container.child_path("device"), device.path())
    }
}

impl RegisteredType for ElectrodeGroup<'_> {
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

impl TypedEntity for ElectrodeGroup<'_> {
    const NAMESPACE: &'static str = CORE;
    const TYPE_NAME: &'static str = "ElectrodeGroup";

    fn create<'io>(path: &str, io: &'io dyn BaseIo) -> Entity<'io> {
        Entity::ElectrodeGroup(ElectrodeGroup::new(path, io))
    }
}
