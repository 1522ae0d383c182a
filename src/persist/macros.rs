//! Compile-time generated accessors for tracked entities.
//!
//! `tracked_entity!` declares a typed handle over an entity living in an
//! [`EntityGraph`](crate::tracking::EntityGraph). Every generated getter and
//! setter goes through the entity's change set, so state transitions, the
//! primary-key guard and relation propagation apply exactly as they do for
//! untyped access.
//!
//! ```ignore
//! tracked_entity! {
//!     pub struct Customer table = "customers" {
//!         #[tracked(key)]
//!         id: i64,
//!         name: String,
//!         email: Option<String>,
//!         #[tracked(one_to_many = "Order", loader = "customer_orders")]
//!         orders: Vec<EntityKey>,
//!     }
//! }
//!
//! let customer = Customer::create(&mut graph);
//! customer.set_id(&mut graph, 1)?;
//! customer.set_name(&mut graph, "Alice".to_string())?;
//! ```
//!
//! Field attributes inside `#[tracked(..)]`: `key`, one relation kind
//! (`one_to_many`, `many_to_one`, `one_to_one` = "Target"), then
//! `loader = "name"`. The relation kind must come before `loader`.

#[macro_export]
#[doc(hidden)]
macro_rules! __tracked_apply_args {
    ($prop:expr;) => {
        $prop
    };
    ($prop:expr; key $(, $($rest:tt)*)?) => {
        $crate::__tracked_apply_args!($prop.primary_key(); $($($rest)*)?)
    };
    ($prop:expr; one_to_many = $target:literal $(, $($rest:tt)*)?) => {
        $crate::__tracked_apply_args!(
            $prop.related($crate::metadata::RelationKind::OneToMany, $target);
            $($($rest)*)?
        )
    };
    ($prop:expr; many_to_one = $target:literal $(, $($rest:tt)*)?) => {
        $crate::__tracked_apply_args!(
            $prop.related($crate::metadata::RelationKind::ManyToOne, $target);
            $($($rest)*)?
        )
    };
    ($prop:expr; one_to_one = $target:literal $(, $($rest:tt)*)?) => {
        $crate::__tracked_apply_args!(
            $prop.related($crate::metadata::RelationKind::OneToOne, $target);
            $($($rest)*)?
        )
    };
    ($prop:expr; loader = $loader:literal $(, $($rest:tt)*)?) => {
        $crate::__tracked_apply_args!($prop.loader($loader); $($($rest)*)?)
    };
    ($prop:expr; column = $column:literal $(, $($rest:tt)*)?) => {
        $crate::__tracked_apply_args!($prop.field_name($column); $($($rest)*)?)
    };
}

#[macro_export]
#[doc(hidden)]
macro_rules! __tracked_property {
    (@attrs $prop:expr;) => {
        $prop
    };
    (@attrs $prop:expr; #[tracked($($args:tt)*)] $($rest:tt)*) => {
        $crate::__tracked_property!(@attrs $crate::__tracked_apply_args!($prop; $($args)*); $($rest)*)
    };
    (@attrs $prop:expr; #[ $($_other:tt)* ] $($rest:tt)*) => {
        $crate::__tracked_property!(@attrs $prop; $($rest)*)
    };
    ($field:ident : $field_ty:ty; $($attrs:tt)*) => {
        $crate::__tracked_property!(
            @attrs
            $crate::metadata::PropertyMetadata::new(
                stringify!($field),
                <$field_ty as $crate::core::TrackedValue>::data_type(),
            )
            .nullable(<$field_ty as $crate::core::TrackedValue>::nullable());
            $($attrs)*
        )
    };
}

#[macro_export]
macro_rules! tracked_entity {
    ($vis:vis struct $name:ident table = $table:literal { $($(#[$($field_meta:tt)*])* $field:ident : $field_ty:ty),+ $(,)? }) => {
        $crate::tracked_entity!(@impl $vis $name $table; $($(#[$($field_meta)*])* $field : $field_ty),+);
    };
    ($vis:vis struct $name:ident { $($(#[$($field_meta:tt)*])* $field:ident : $field_ty:ty),+ $(,)? }) => {
        $crate::tracked_entity!(@impl $vis $name stringify!($name); $($(#[$($field_meta)*])* $field : $field_ty),+);
    };
    (@impl $vis:vis $name:ident $table:expr; $($(#[$($field_meta:tt)*])* $field:ident : $field_ty:ty),+) => {
        /// Typed handle over a tracked entity; the data lives in the graph.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis struct $name {
            key: $crate::core::EntityKey,
        }

        impl $name {
            pub const TYPE_NAME: &'static str = stringify!($name);

            pub fn metadata() -> std::sync::Arc<$crate::metadata::EntityMetadata> {
                static METADATA: std::sync::OnceLock<std::sync::Arc<$crate::metadata::EntityMetadata>> =
                    std::sync::OnceLock::new();
                METADATA
                    .get_or_init(|| {
                        std::sync::Arc::new(
                            $crate::metadata::EntityMetadata::new(Self::TYPE_NAME, $table)
                                $(
                                    .with_property($crate::__tracked_property!(
                                        $field : $field_ty; $(#[$($field_meta)*])*
                                    ))
                                )+
                        )
                    })
                    .clone()
            }

            /// Tracks a new instance pending insert (`Attached`).
            pub fn create(graph: &mut $crate::tracking::EntityGraph) -> Self {
                Self {
                    key: graph.add(Self::metadata()),
                }
            }

            /// Tracks an instance read from the store (`Unchanged`). Populate it
            /// with the `load_*` methods.
            pub fn materialize(graph: &mut $crate::tracking::EntityGraph) -> Self {
                Self {
                    key: graph.track(Self::metadata()),
                }
            }

            /// Wraps an existing key after checking the entity's type.
            pub fn from_key(
                graph: &$crate::tracking::EntityGraph,
                key: $crate::core::EntityKey,
            ) -> $crate::core::Result<Self> {
                let entity = graph.entity(key)?;
                if entity.type_name() != Self::TYPE_NAME {
                    return Err($crate::core::DbError::TypeMismatch(format!(
                        "entity {} is a {}, not a {}",
                        key,
                        entity.type_name(),
                        Self::TYPE_NAME
                    )));
                }
                Ok(Self { key })
            }

            pub fn key(&self) -> $crate::core::EntityKey {
                self.key
            }

            pub fn entity<'g>(
                &self,
                graph: &'g $crate::tracking::EntityGraph,
            ) -> $crate::core::Result<&'g $crate::tracking::Entity> {
                graph.entity(self.key)
            }

            pub fn state(
                &self,
                graph: &$crate::tracking::EntityGraph,
            ) -> $crate::core::Result<$crate::tracking::EntityState> {
                Ok(graph.entity(self.key)?.state())
            }

            $crate::paste::paste! {
                $(
                    pub fn $field(
                        &self,
                        graph: &$crate::tracking::EntityGraph,
                    ) -> $crate::core::Result<$field_ty> {
                        let entity = graph.entity(self.key)?;
                        match entity.value(stringify!($field)) {
                            Ok(slot) => <$field_ty as $crate::core::TrackedValue>::from_value(slot.value()),
                            Err($crate::core::DbError::NotFound { .. })
                                if entity
                                    .property(stringify!($field))
                                    .map(|property| property.nullable)
                                    .unwrap_or(false) =>
                            {
                                <$field_ty as $crate::core::TrackedValue>::from_value(None)
                            }
                            Err(err) => Err(err),
                        }
                    }

                    pub fn [<set_ $field>](
                        &self,
                        graph: &mut $crate::tracking::EntityGraph,
                        value: $field_ty,
                    ) -> $crate::core::Result<()> {
                        graph.set_value(
                            self.key,
                            stringify!($field),
                            $crate::core::TrackedValue::into_value(value),
                        )
                    }

                    pub fn [<load_ $field>](
                        &self,
                        graph: &mut $crate::tracking::EntityGraph,
                        value: $field_ty,
                    ) -> $crate::core::Result<()> {
                        graph.load_value(
                            self.key,
                            stringify!($field),
                            $crate::core::TrackedValue::into_value(value),
                        )
                    }
                )+
            }
        }
    };
}
