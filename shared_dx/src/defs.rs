//! D3D9 and D3DX values used by the policy code.  They mirror the SDK headers so that the
//! cache, MSAA and loader crates can be built and tested without winapi.
#![allow(non_camel_case_types, non_upper_case_globals)]

pub type HRESULT = i32;
pub type D3DFORMAT = u32;

pub const S_OK: HRESULT = 0;
pub const E_FAIL: HRESULT = 0x8000_4005_u32 as i32;
pub const E_OUTOFMEMORY: HRESULT = 0x8007_000E_u32 as i32;
pub const D3DERR_INVALIDCALL: HRESULT = 0x8876_086C_u32 as i32;
pub const D3DERR_NOTAVAILABLE: HRESULT = 0x8876_087A_u32 as i32;

pub fn succeeded(hr: HRESULT) -> bool {
    hr >= 0
}

pub fn failed(hr: HRESULT) -> bool {
    hr < 0
}

pub const fn make_fourcc(a: u8, b: u8, c: u8, d: u8) -> u32 {
    (a as u32) | ((b as u32) << 8) | ((c as u32) << 16) | ((d as u32) << 24)
}

pub const D3DFMT_UNKNOWN: D3DFORMAT = 0;
pub const D3DFMT_R8G8B8: D3DFORMAT = 20;
pub const D3DFMT_A8R8G8B8: D3DFORMAT = 21;
pub const D3DFMT_X8R8G8B8: D3DFORMAT = 22;
pub const D3DFMT_R5G6B5: D3DFORMAT = 23;
pub const D3DFMT_X1R5G5B5: D3DFORMAT = 24;
pub const D3DFMT_A1R5G5B5: D3DFORMAT = 25;
pub const D3DFMT_A4R4G4B4: D3DFORMAT = 26;
pub const D3DFMT_R3G3B2: D3DFORMAT = 27;
pub const D3DFMT_A8: D3DFORMAT = 28;
pub const D3DFMT_A8R3G3B2: D3DFORMAT = 29;
pub const D3DFMT_X4R4G4B4: D3DFORMAT = 30;
pub const D3DFMT_A2B10G10R10: D3DFORMAT = 31;
pub const D3DFMT_A8B8G8R8: D3DFORMAT = 32;
pub const D3DFMT_X8B8G8R8: D3DFORMAT = 33;
pub const D3DFMT_G16R16: D3DFORMAT = 34;
pub const D3DFMT_A2R10G10B10: D3DFORMAT = 35;
pub const D3DFMT_A16B16G16R16: D3DFORMAT = 36;
pub const D3DFMT_A8P8: D3DFORMAT = 40;
pub const D3DFMT_P8: D3DFORMAT = 41;
pub const D3DFMT_L8: D3DFORMAT = 50;
pub const D3DFMT_A8L8: D3DFORMAT = 51;
pub const D3DFMT_A4L4: D3DFORMAT = 52;
pub const D3DFMT_V8U8: D3DFORMAT = 60;
pub const D3DFMT_L6V5U5: D3DFORMAT = 61;
pub const D3DFMT_X8L8V8U8: D3DFORMAT = 62;
pub const D3DFMT_Q8W8V8U8: D3DFORMAT = 63;
pub const D3DFMT_V16U16: D3DFORMAT = 64;
pub const D3DFMT_A2W10V10U10: D3DFORMAT = 67;
pub const D3DFMT_D16_LOCKABLE: D3DFORMAT = 70;
pub const D3DFMT_D32: D3DFORMAT = 71;
pub const D3DFMT_D15S1: D3DFORMAT = 73;
pub const D3DFMT_D24S8: D3DFORMAT = 75;
pub const D3DFMT_D24X8: D3DFORMAT = 77;
pub const D3DFMT_D24X4S4: D3DFORMAT = 79;
pub const D3DFMT_D16: D3DFORMAT = 80;
pub const D3DFMT_L16: D3DFORMAT = 81;
pub const D3DFMT_D32F_LOCKABLE: D3DFORMAT = 82;
pub const D3DFMT_D24FS8: D3DFORMAT = 83;
pub const D3DFMT_D32_LOCKABLE: D3DFORMAT = 84;
pub const D3DFMT_S8_LOCKABLE: D3DFORMAT = 85;
pub const D3DFMT_VERTEXDATA: D3DFORMAT = 100;
pub const D3DFMT_INDEX16: D3DFORMAT = 101;
pub const D3DFMT_INDEX32: D3DFORMAT = 102;
pub const D3DFMT_Q16W16V16U16: D3DFORMAT = 110;
pub const D3DFMT_R16F: D3DFORMAT = 111;
pub const D3DFMT_G16R16F: D3DFORMAT = 112;
pub const D3DFMT_A16B16G16R16F: D3DFORMAT = 113;
pub const D3DFMT_R32F: D3DFORMAT = 114;
pub const D3DFMT_G32R32F: D3DFORMAT = 115;
pub const D3DFMT_A32B32G32R32F: D3DFORMAT = 116;
pub const D3DFMT_CxV8U8: D3DFORMAT = 117;
pub const D3DFMT_A1: D3DFORMAT = 118;
pub const D3DFMT_A2B10G10R10_XR_BIAS: D3DFORMAT = 119;
pub const D3DFMT_BINARYBUFFER: D3DFORMAT = 199;

pub const D3DFMT_UYVY: D3DFORMAT = make_fourcc(b'U', b'Y', b'V', b'Y');
pub const D3DFMT_R8G8_B8G8: D3DFORMAT = make_fourcc(b'R', b'G', b'B', b'G');
pub const D3DFMT_YUY2: D3DFORMAT = make_fourcc(b'Y', b'U', b'Y', b'2');
pub const D3DFMT_G8R8_G8B8: D3DFORMAT = make_fourcc(b'G', b'R', b'G', b'B');
pub const D3DFMT_DXT1: D3DFORMAT = make_fourcc(b'D', b'X', b'T', b'1');
pub const D3DFMT_DXT2: D3DFORMAT = make_fourcc(b'D', b'X', b'T', b'2');
pub const D3DFMT_DXT3: D3DFORMAT = make_fourcc(b'D', b'X', b'T', b'3');
pub const D3DFMT_DXT4: D3DFORMAT = make_fourcc(b'D', b'X', b'T', b'4');
pub const D3DFMT_DXT5: D3DFORMAT = make_fourcc(b'D', b'X', b'T', b'5');
pub const D3DFMT_MULTI2_ARGB8: D3DFORMAT = make_fourcc(b'M', b'E', b'T', b'1');

pub const D3DUSAGE_RENDERTARGET: u32 = 0x0000_0001;
pub const D3DUSAGE_DEPTHSTENCIL: u32 = 0x0000_0002;
pub const D3DUSAGE_WRITEONLY: u32 = 0x0000_0008;
pub const D3DUSAGE_SOFTWAREPROCESSING: u32 = 0x0000_0010;
pub const D3DUSAGE_DONOTCLIP: u32 = 0x0000_0020;
pub const D3DUSAGE_POINTS: u32 = 0x0000_0040;
pub const D3DUSAGE_RTPATCHES: u32 = 0x0000_0080;
pub const D3DUSAGE_NPATCHES: u32 = 0x0000_0100;
pub const D3DUSAGE_DYNAMIC: u32 = 0x0000_0200;
pub const D3DUSAGE_AUTOGENMIPMAP: u32 = 0x0000_0400;
pub const D3DUSAGE_DMAP: u32 = 0x0000_4000;

pub const D3DPOOL_DEFAULT: u32 = 0;
pub const D3DPOOL_MANAGED: u32 = 1;
pub const D3DPOOL_SYSTEMMEM: u32 = 2;
pub const D3DPOOL_SCRATCH: u32 = 3;

pub const D3DMULTISAMPLE_NONE: u32 = 0;

pub const D3DTEXF_NONE: u32 = 0;
pub const D3DTEXF_POINT: u32 = 1;
pub const D3DTEXF_LINEAR: u32 = 2;

pub const D3DSAMP_ADDRESSU: u32 = 1;
pub const D3DSAMP_ADDRESSV: u32 = 2;
pub const D3DSAMP_ADDRESSW: u32 = 3;
pub const D3DTADDRESS_WRAP: u32 = 1;
pub const D3DTADDRESS_CLAMP: u32 = 3;

pub const D3DX_DEFAULT: u32 = u32::MAX;
pub const D3DX_DEFAULT_NONPOW2: u32 = u32::MAX - 1;
pub const D3DX_FROM_FILE: u32 = u32::MAX - 2;
pub const D3DFMT_FROM_FILE: D3DFORMAT = u32::MAX - 2;

pub const D3DX_FILTER_NONE: u32 = 1;
pub const D3DX_FILTER_POINT: u32 = 2;
pub const D3DX_FILTER_LINEAR: u32 = 3;
pub const D3DX_FILTER_TRIANGLE: u32 = 4;
pub const D3DX_FILTER_BOX: u32 = 5;
pub const D3DX_FILTER_DITHER: u32 = 0x0008_0000;

pub const D3DXIFF_BMP: u32 = 0;
pub const D3DXIFF_JPG: u32 = 1;
pub const D3DXIFF_TGA: u32 = 2;
pub const D3DXIFF_PNG: u32 = 3;
pub const D3DXIFF_DDS: u32 = 4;
