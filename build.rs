fn main() {
    let echo_service = tonic_build::manual::Service::builder()
        .name("EchoService")
        .package("echo")
        .method(
            tonic_build::manual::Method::builder()
                .name("echo")
                .route_name("Echo")
                .input_type("crate::proto::EchoRequest")
                .output_type("crate::proto::EchoResponse")
                .codec_path("tonic::codec::ProstCodec")
                .build(),
        )
        .build();

    tonic_build::manual::Builder::new().compile(&[echo_service]);
}
