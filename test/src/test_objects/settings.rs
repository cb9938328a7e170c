use lattice_shared::{ChangeType, DataIStream, DataOStream, Distributable, SerdeErr};

/// Distributed once when mapped, never committed
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Settings {
    pub name: String,
    pub width: u32,
    pub height: u32,
}

impl Distributable for Settings {
    fn change_type(&self) -> ChangeType {
        ChangeType::Static
    }

    fn get_instance_data(&self, writer: &mut DataOStream) {
        writer.write(&self.name).write(&self.width).write(&self.height);
    }

    fn apply_instance_data(&mut self, reader: &mut DataIStream) -> Result<(), SerdeErr> {
        self.name = reader.read()?;
        self.width = reader.read()?;
        self.height = reader.read()?;
        Ok(())
    }
}
