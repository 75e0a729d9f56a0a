//! Field metadata for models.

/// The backend's field classes.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display, strum::EnumString, strum::AsRefStr,
)]
pub enum FieldType {
    AutoField,
    CharField,
    TextField,
    EmailField,
    EncryptedField,
    IntegerField,
    FloatField,
    BooleanField,
    NullBooleanField,
    DateField,
    DateTimeField,
    JSONField,
    ArrayField,
    PartitionField,
    ForeignKey,
    OneToOneField,
    ManyToManyField,
}

impl FieldType {
    pub fn is_relation(&self) -> bool {
        matches!(
            self,
            FieldType::ForeignKey | FieldType::OneToOneField | FieldType::ManyToManyField
        )
    }
}

/// Description of one field of a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSchema {
    pub field_name: &'static str,
    pub field_type: FieldType,
    pub nullable: bool,
    pub read_only: bool,
    /// Endpoint of the related model, for relation fields.
    pub related_model: Option<&'static str>,
}
