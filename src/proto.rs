//! Wire types and generated gRPC stubs for `echo.EchoService`.

/// Request for `EchoService/Echo`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EchoRequest {
    /// Text to greet.
    #[prost(string, tag = "1")]
    pub text: ::prost::alloc::string::String,
}

/// Response for `EchoService/Echo`.
#[derive(Clone, PartialEq, ::prost::Message)]
pub struct EchoResponse {
    /// Greeting produced by the server.
    #[prost(string, tag = "1")]
    pub text: ::prost::alloc::string::String,
}

include!(concat!(env!("OUT_DIR"), "/echo.EchoService.rs"));
