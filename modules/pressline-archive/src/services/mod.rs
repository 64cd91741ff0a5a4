pub(crate) mod birdwatch_export;
pub(crate) mod birdwatch_ref;
pub(crate) mod notes;
pub(crate) mod timeline;
pub(crate) mod twitter_quote;
pub(crate) mod yahoo_pickup;
pub(crate) mod youtube;
