pub mod effect_group;
